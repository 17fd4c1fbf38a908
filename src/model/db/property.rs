use serde::{Deserialize, Serialize};

/// Name of the flag that, while `true`, stops any vote from being accepted.
pub const ELECTION_CLOSED: &str = "electionClosed";

/// A named boolean election setting. One document per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionProperty {
    #[serde(rename = "_id")]
    pub name: String,
    pub value: bool,
}
