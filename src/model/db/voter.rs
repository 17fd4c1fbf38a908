use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{NationalId, Permission};

/// A registered voter, as stored in the database.
///
/// `has_voted` only ever moves from `false` to `true`, and only inside the
/// atomic vote recording of a [`crate::model::store::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub national_id: NationalId,
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub permissions: Vec<Permission>,
    pub has_voted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub password_changed_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Voter {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed hash can only come from outside this crate; treat it as a mismatch.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// Does this voter hold the given permission?
    pub fn permits(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}


#[cfg(test)]
mod tests {
    use super::examples::EXAMPLE_PASSWORD;
    use super::*;

    #[test]
    fn password_verification() {
        let voter = Voter::example();
        assert!(voter.verify_password(EXAMPLE_PASSWORD));
        assert!(!voter.verify_password("wrong password"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let mut voter = Voter::example();
        voter.password_hash = "not a hash".to_string();
        assert!(!voter.verify_password(EXAMPLE_PASSWORD));
    }

    #[test]
    fn permissions() {
        assert!(Voter::example().permits(Permission::Vote));
        assert!(!Voter::example().permits(Permission::Admin));
        assert!(Voter::example_admin().permits(Permission::Admin));
    }
}
