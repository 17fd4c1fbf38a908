use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::model::common::{NationalId, Permission};

use super::{KeyConfigurationError, TokenCodec, TokenError, TokenPayload};

/// Issues and verifies access tokens.
///
/// Built once at ignition from the configured key and then shared read-only
/// between every request.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    codec: TokenCodec,
}

impl TokenAuthority {
    pub fn new(key: &[u8]) -> Result<Self, KeyConfigurationError> {
        Ok(Self {
            codec: TokenCodec::new(key)?,
        })
    }

    /// Issue a token for the given voter, valid for `ttl` from now.
    pub fn issue(
        &self,
        national_id: NationalId,
        permissions: Vec<Permission>,
        ttl: Duration,
    ) -> (String, TokenPayload) {
        self.issue_at(national_id, permissions, ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        national_id: NationalId,
        permissions: Vec<Permission>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> (String, TokenPayload) {
        let payload = TokenPayload {
            id: Uuid::new_v4(),
            national_id,
            permissions,
            issued_at: now,
            expired_at: now + ttl,
        };
        let json = serde_json::to_vec(&payload).expect("token payload serialization is infallible");
        (self.codec.seal(&json), payload)
    }

    /// Decrypt and authenticate a token, then check it has not expired.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let json = self.codec.open(token)?;
        // Authenticated but unparseable can only mean a key shared with another format.
        let payload: TokenPayload =
            serde_json::from_slice(&json).map_err(|_| TokenError::Invalid)?;
        if payload.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(payload)
    }
}
