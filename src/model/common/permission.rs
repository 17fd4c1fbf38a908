use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Something an authenticated voter is entitled to do.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Permission {
    /// Cast a ballot and read candidates and results.
    Vote = 0,
    /// Manage candidates, open/close the election and export ballots.
    Admin = 1,
}

impl Display for Permission {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Vote => "vote",
                Self::Admin => "admin",
            }
        )
    }
}
