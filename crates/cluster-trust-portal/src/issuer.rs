//! Token issuance.

use std::sync::Arc;

use cluster_trust_core::{Claims, ClaimsSpec, CoreError, TokenId, TokenPolicy};
use jsonwebtoken::{encode, Algorithm, Header};

use crate::error::{PortalError, Result};
use crate::manager::KeyManager;

/// Mints signed cluster tokens with the manager's active key.
#[derive(Debug, Clone)]
pub struct Issuer {
    manager: Arc<KeyManager>,
    policy: TokenPolicy,
}

impl Issuer {
    /// Create an issuer that signs with `manager`'s keys under `policy`.
    #[must_use]
    pub fn new(manager: Arc<KeyManager>, policy: TokenPolicy) -> Self {
        Self { manager, policy }
    }

    /// The lifetime policy applied to issued tokens.
    #[must_use]
    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Build the claims for `spec` without signing them.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::InvalidClaims` if a required field is blank or the
    /// scope list is empty.
    pub fn build_claims(&self, spec: &ClaimsSpec) -> Result<Claims> {
        spec.validate().map_err(|e| match e {
            CoreError::InvalidClaims(msg) | CoreError::InvalidJwk(msg) => {
                PortalError::InvalidClaims(msg)
            }
        })?;

        let ttl = self.policy.resolve_ttl(spec.ttl);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let issued_at = self.manager.clock().now().timestamp();

        Ok(Claims {
            issuer: spec.issuer.trim().to_string(),
            subject: spec.subject.trim().to_string(),
            audience: spec.audience.trim().to_string(),
            issued_at,
            not_before: issued_at,
            expires_at: issued_at.saturating_add(ttl_secs),
            token_id: TokenId::generate(),
            scope: spec.joined_scope(),
        })
    }

    /// Mint a compact, `EdDSA`-signed token for `spec`.
    ///
    /// The header carries the signing key's `kid`. If the Portal has no
    /// active key yet, one is generated.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::InvalidClaims` before touching any key if the
    /// spec is incomplete, a key manager error if no key can be obtained, or
    /// `PortalError::Signing` if signing fails.
    pub fn issue(&self, spec: &ClaimsSpec) -> Result<String> {
        let claims = self.build_claims(spec)?;
        let key = self.manager.ensure_active_key()?;

        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(key.kid().to_string());

        let token = encode(&header, &claims, &key.encoding_key())
            .map_err(|e| PortalError::Signing(e.to_string()))?;

        tracing::debug!(
            kid = %key.kid(),
            jti = %claims.token_id,
            ttl = claims.ttl_seconds(),
            scope = %claims.scope,
            "Issued token"
        );
        Ok(token)
    }
}
