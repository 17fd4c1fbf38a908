use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    model::{
        common::{NationalId, Permission},
        db::Voter,
    },
};

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A registration request, as sent by a prospective voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub national_id: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

impl TryFrom<VoterRegistration> for Voter {
    type Error = Error;

    /// Validate the registration and hash the password.
    fn try_from(registration: VoterRegistration) -> Result<Self, Self::Error> {
        let national_id: NationalId = registration
            .national_id
            .parse()
            .map_err(|e| Error::BadRequest(format!("{e}")))?;
        if registration.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let full_name = registration.full_name.trim();
        if full_name.is_empty() {
            return Err(Error::BadRequest("full name must not be empty".to_string()));
        }
        let email = registration.email.trim();
        if !valid_email(email) {
            return Err(Error::BadRequest("email address is not valid".to_string()));
        }

        let now = Utc::now();
        Ok(Voter {
            national_id,
            password_hash: hash_password(&registration.password),
            full_name: full_name.to_string(),
            email: email.to_string(),
            permissions: vec![Permission::Vote],
            has_voted: false,
            password_changed_at: now,
            created_at: now,
        })
    }
}

/// Something shaped like `local@domain.tld`.
fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Hash a password with argon2 under a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .expect("the default argon2 config is valid")
}

/// Login credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub national_id: String,
    pub password: String,
}

/// A voter as shown to clients, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub national_id: NationalId,
    pub full_name: String,
    pub email: String,
    pub permissions: Vec<Permission>,
    pub has_voted: bool,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            national_id: voter.national_id,
            full_name: voter.full_name,
            email: voter.email,
            permissions: voter.permissions,
            has_voted: voter.has_voted,
            password_changed_at: voter.password_changed_at,
            created_at: voter.created_at,
        }
    }
}

/// A successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub expired_at: DateTime<Utc>,
    pub user: VoterDescription,
}
