//! Opaque tokens
//!
//! A token's plaintext is 16 random bytes rendered as unpadded base-32, which
//! is always 26 characters. Only the SHA-256 fingerprint of the plaintext is
//! ever persisted; the plaintext leaves the process exactly once, in the
//! response that created it.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{db::StoreError, utils::Validator};

/// Random bytes drawn per token
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of the base-32 plaintext for [`TOKEN_ENTROPY_BYTES`]
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// One-way digest of a token plaintext
pub type Fingerprint = [u8; 32];

/// What a token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenScope {
    Authentication,
    Activation,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::Activation => "activation",
            TokenScope::PasswordReset => "password-reset",
        }
    }

    /// Lifetime of a freshly issued token in this scope
    pub fn ttl(&self) -> Duration {
        match self {
            TokenScope::Authentication => Duration::hours(24),
            TokenScope::Activation => Duration::days(3),
            TokenScope::PasswordReset => Duration::minutes(45),
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authentication" => Ok(TokenScope::Authentication),
            "activation" => Ok(TokenScope::Activation),
            "password-reset" => Ok(TokenScope::PasswordReset),
            _ => Err(format!("Invalid token scope: {}", s)),
        }
    }
}

/// A freshly generated token
#[derive(Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub fingerprint: Fingerprint,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Token {
    /// Draw a new token for `user_id` valid for `ttl`
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Result<Self, StoreError> {
        let mut random = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| StoreError::Entropy(e.to_string()))?;

        let plaintext = BASE32_NOPAD.encode(&random);
        let fingerprint = fingerprint(&plaintext);

        Ok(Self {
            plaintext,
            fingerprint,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        })
    }
}

/// SHA-256 of the plaintext
pub fn fingerprint(plaintext: &str) -> Fingerprint {
    Sha256::digest(plaintext.as_bytes()).into()
}

/// Syntactic checks applied before any lookup
pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

/// Persisted view of a token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}
