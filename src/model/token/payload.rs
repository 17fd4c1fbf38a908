use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::common::{NationalId, Permission};

/// The claims carried inside an access token.
///
/// Never stored server side: a token is valid purely as a function of these
/// fields and the current time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Random, unique per issued token. Safe to log.
    #[serde(rename = "jti")]
    pub id: Uuid,
    #[serde(rename = "nid")]
    pub national_id: NationalId,
    #[serde(rename = "prm")]
    pub permissions: Vec<Permission>,
    #[serde(rename = "iat")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp")]
    pub expired_at: DateTime<Utc>,
}

impl TokenPayload {
    pub fn permits(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// A token is still valid at the instant of its expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at
    }
}
