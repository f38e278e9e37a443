//! Ed25519 signing keys.

use std::fmt;
use std::time::Duration;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use cluster_trust_core::{KeyId, PublicJwk, CRV_ED25519, ED25519_KEY_LEN, KTY_OKP};
use cluster_trust_store::KeyRecord;
use jsonwebtoken::EncodingKey;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair};
use secrecy::{ExposeSecret, SecretBox};

use crate::error::{PortalError, Result};

/// PKCS#8 v1 header for a bare Ed25519 seed (RFC 8410).
const PKCS8_ED25519_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

/// One Ed25519 signing key pair.
///
/// Keys are immutable once created. Rotation adds a new key; an old key stays
/// around for verification until it expires.
pub struct SigningKey {
    kid: KeyId,
    created_at: DateTime<Utc>,
    not_after: Option<DateTime<Utc>>,
    seed: SecretBox<[u8; ED25519_KEY_LEN]>,
    public_key: [u8; ED25519_KEY_LEN],
}

impl SigningKey {
    /// Generate a new key from the system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::KeyGeneration` if the random source fails.
    pub fn generate(created_at: DateTime<Utc>, lifetime: Option<Duration>) -> Result<Self> {
        let mut seed = [0u8; ED25519_KEY_LEN];
        SystemRandom::new()
            .fill(&mut seed)
            .map_err(|_| PortalError::KeyGeneration("random source failed".to_string()))?;

        let not_after = match lifetime {
            Some(lifetime) => Some(
                chrono::Duration::from_std(lifetime)
                    .ok()
                    .and_then(|d| created_at.checked_add_signed(d))
                    .ok_or_else(|| {
                        PortalError::KeyGeneration("key lifetime out of range".to_string())
                    })?,
            ),
            None => None,
        };

        let public_key = derive_public_key(&seed)
            .map_err(|reason| PortalError::KeyGeneration(reason.to_string()))?;
        let kid = KeyId::derive(created_at, &public_key);

        Ok(Self {
            kid,
            created_at,
            not_after,
            seed: SecretBox::new(Box::new(seed)),
            public_key,
        })
    }

    /// Key ID.
    #[must_use]
    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry, or `None` if the key never expires.
    #[must_use]
    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn public_key(&self) -> [u8; ED25519_KEY_LEN] {
        self.public_key
    }

    /// Whether the key has not expired at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after.map_or(true, |not_after| now <= not_after)
    }

    /// The public JWK published for this key.
    #[must_use]
    pub fn public_jwk(&self) -> PublicJwk {
        PublicJwk::ed25519(self.kid.as_str(), &self.public_key)
    }

    /// Signing key for `jsonwebtoken`.
    #[must_use]
    pub fn encoding_key(&self) -> EncodingKey {
        let mut der = Vec::with_capacity(PKCS8_ED25519_PREFIX.len() + ED25519_KEY_LEN);
        der.extend_from_slice(&PKCS8_ED25519_PREFIX);
        der.extend_from_slice(self.seed.expose_secret());
        EncodingKey::from_ed_der(&der)
    }

    /// The private record persisted for this key.
    #[must_use]
    pub fn to_record(&self) -> KeyRecord {
        KeyRecord {
            kty: KTY_OKP.to_string(),
            crv: CRV_ED25519.to_string(),
            kid: self.kid.clone(),
            x: BASE64_URL_SAFE_NO_PAD.encode(self.public_key),
            d: Some(BASE64_URL_SAFE_NO_PAD.encode(self.seed.expose_secret())),
            created_at: self.created_at.timestamp(),
            not_after: self.not_after.map_or(0, |t| t.timestamp()),
        }
    }
}

impl TryFrom<&KeyRecord> for SigningKey {
    type Error = PortalError;

    fn try_from(record: &KeyRecord) -> Result<Self> {
        let corrupt = |reason: String| PortalError::CorruptKey {
            kid: record.kid.to_string(),
            reason,
        };

        if record.kty != KTY_OKP {
            return Err(corrupt(format!("unsupported key type {:?}", record.kty)));
        }
        if record.crv != CRV_ED25519 {
            return Err(corrupt(format!("unsupported curve {:?}", record.crv)));
        }

        let d = record
            .d
            .as_deref()
            .ok_or_else(|| corrupt("missing private key".to_string()))?;
        let decoded = BASE64_URL_SAFE_NO_PAD
            .decode(d)
            .map_err(|e| corrupt(format!("invalid private key encoding: {e}")))?;
        let len = decoded.len();
        let seed: [u8; ED25519_KEY_LEN] = decoded.try_into().map_err(|_| {
            corrupt(format!(
                "private key is {len} bytes, expected {ED25519_KEY_LEN}"
            ))
        })?;

        let public_key =
            derive_public_key(&seed).map_err(|reason| corrupt(reason.to_string()))?;
        if !record.x.is_empty() {
            let stored = BASE64_URL_SAFE_NO_PAD
                .decode(&record.x)
                .map_err(|e| corrupt(format!("invalid public key encoding: {e}")))?;
            if stored != public_key {
                return Err(corrupt("public key does not match private key".to_string()));
            }
        }

        let created_at = DateTime::from_timestamp(record.created_at, 0)
            .ok_or_else(|| corrupt(format!("invalid createdAt {}", record.created_at)))?;
        let not_after = match record.not_after {
            0 => None,
            secs => Some(
                DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| corrupt(format!("invalid notAfter {secs}")))?,
            ),
        };

        Ok(Self {
            kid: record.kid.clone(),
            created_at,
            not_after,
            seed: SecretBox::new(Box::new(seed)),
            public_key,
        })
    }
}

/// Deep copy: the clone owns its own copy of the seed.
impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self {
            kid: self.kid.clone(),
            created_at: self.created_at,
            not_after: self.not_after,
            seed: SecretBox::new(Box::new(*self.seed.expose_secret())),
            public_key: self.public_key,
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("created_at", &self.created_at)
            .field("not_after", &self.not_after)
            .field("seed", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn derive_public_key(
    seed: &[u8; ED25519_KEY_LEN],
) -> std::result::Result<[u8; ED25519_KEY_LEN], &'static str> {
    let pair = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|_| "invalid Ed25519 seed")?;
    pair.public_key()
        .as_ref()
        .try_into()
        .map_err(|_| "unexpected public key length")
}
