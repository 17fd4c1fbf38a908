use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, NationalId};

/// A request to cast a vote. `national_id` names the voter the vote is cast
/// for, which must be the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub national_id: NationalId,
    pub candidate_id: CandidateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusRequest {
    pub national_id: NationalId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub status: bool,
}
