//! Token claims.
//!
//! [`ClaimsSpec`] is what a Portal caller asks for; [`Claims`] is what ends up
//! signed inside the token and what a Node gets back after verification.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::TokenId;

/// A request to mint a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsSpec {
    /// Issuer (`iss`), normally the Portal's public URL.
    pub issuer: String,
    /// Subject (`sub`), the node or client the token is for.
    pub subject: String,
    /// Audience (`aud`).
    pub audience: String,
    /// Granted scopes. Must not be empty.
    pub scope: Vec<String>,
    /// Requested lifetime. `None` or zero selects the policy default.
    pub ttl: Option<Duration>,
}

impl ClaimsSpec {
    /// Create a spec with the default lifetime.
    pub fn new<I, S>(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        scope: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer: issuer.into(),
            subject: subject.into(),
            audience: audience.into(),
            scope: scope.into_iter().map(Into::into).collect(),
            ttl: None,
        }
    }

    /// Request a specific lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidClaims` naming the first blank field, or if
    /// the scope list is empty or contains a blank entry.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("issuer", &self.issuer),
            ("subject", &self.subject),
            ("audience", &self.audience),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::InvalidClaims(format!("{name} is required")));
            }
        }
        if self.scope.is_empty() {
            return Err(CoreError::InvalidClaims("scope is required".to_string()));
        }
        if self.scope.iter().any(|s| s.trim().is_empty()) {
            return Err(CoreError::InvalidClaims(
                "scope entries must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// The scope list joined the way it is stored in a token.
    #[must_use]
    pub fn joined_scope(&self) -> String {
        self.scope
            .iter()
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The payload of a cluster token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Subject.
    #[serde(rename = "sub")]
    pub subject: String,
    /// Audience.
    #[serde(rename = "aud")]
    pub audience: String,
    /// Issued-at, seconds since the epoch.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Not-before, seconds since the epoch.
    #[serde(rename = "nbf")]
    pub not_before: i64,
    /// Expiry, seconds since the epoch.
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// Unique token ID.
    #[serde(rename = "jti")]
    pub token_id: TokenId,
    /// Space-separated scopes.
    pub scope: String,
}

impl Claims {
    /// The set of scopes carried by the token.
    #[must_use]
    pub fn scopes(&self) -> BTreeSet<&str> {
        self.scope.split_whitespace().collect()
    }

    /// Whether the token grants `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }

    /// Lifetime of the token in seconds (`exp - iat`).
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.expires_at.saturating_sub(self.issued_at)
    }
}
