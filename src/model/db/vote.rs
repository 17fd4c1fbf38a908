use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{CandidateId, NationalId},
    mongodb::Id,
};

/// A recorded vote. Immutable once written; at most one exists per voter, and
/// its existence is the durable witness that the voter has voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub national_id: NationalId,
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(national_id: NationalId, candidate_id: CandidateId) -> Self {
        Self {
            id: Id::new(),
            national_id,
            candidate_id,
            created_at: Utc::now(),
        }
    }
}

/// A (candidate, voter) pair, as exported for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotRecord {
    pub candidate_id: CandidateId,
    pub national_id: NationalId,
}

impl From<Vote> for BallotRecord {
    fn from(vote: Vote) -> Self {
        Self {
            candidate_id: vote.candidate_id,
            national_id: vote.national_id,
        }
    }
}
