use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of digits in a national identifier.
pub const NATIONAL_ID_LENGTH: usize = 13;

/// A voter's national identifier: exactly [`NATIONAL_ID_LENGTH`] ASCII digits.
///
/// This is the voter identity throughout the system, both as the primary key
/// of voter records and as the subject of access tokens.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("national ID must be exactly 13 digits")]
pub struct InvalidNationalId;

impl NationalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NationalId {
    type Error = InvalidNationalId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == NATIONAL_ID_LENGTH && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(InvalidNationalId)
        }
    }
}

impl FromStr for NationalId {
    type Err = InvalidNationalId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_string().try_into()
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

impl Display for NationalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
