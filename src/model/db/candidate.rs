use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::CandidateId;

/// The editable, descriptive part of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    pub dob: String,
    pub bio_link: String,
    pub image_url: String,
    pub policy: String,
}

/// A candidate from the database, with its unique ID and running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: CandidateId,
    #[serde(flatten)]
    pub profile: CandidateProfile,
    /// Only ever incremented, by exactly one per accepted vote.
    pub vote_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// A fresh candidate with no votes.
    pub fn new(id: CandidateId, profile: CandidateProfile) -> Self {
        Self {
            id,
            profile,
            vote_count: 0,
            created_at: Utc::now(),
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateProfile;

    fn deref(&self) -> &Self::Target {
        &self.profile
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.profile
    }
}
