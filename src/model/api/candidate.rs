use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    model::{
        common::CandidateId,
        db::{Candidate, CandidateProfile},
    },
};

/// A new or replacement candidate profile, as sent by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub name: String,
    pub dob: String,
    pub bio_link: String,
    pub image_link: String,
    pub policy: String,
}

impl TryFrom<CandidateSpec> for CandidateProfile {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self, Self::Error> {
        let required = [
            ("name", &spec.name),
            ("dob", &spec.dob),
            ("bioLink", &spec.bio_link),
            ("imageLink", &spec.image_link),
            ("policy", &spec.policy),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(Error::BadRequest(format!("`{field}` must not be empty")));
        }
        if chrono::NaiveDate::parse_from_str(&spec.dob, "%Y-%m-%d").is_err() {
            return Err(Error::BadRequest(
                "`dob` must be a date of the form YYYY-MM-DD".to_string(),
            ));
        }
        for (field, link) in [("bioLink", &spec.bio_link), ("imageLink", &spec.image_link)] {
            if !(link.starts_with("http://") || link.starts_with("https://")) {
                return Err(Error::BadRequest(format!("`{field}` must be a URL")));
            }
        }

        Ok(Self {
            name: spec.name,
            dob: spec.dob,
            bio_link: spec.bio_link,
            image_url: spec.image_link,
            policy: spec.policy,
        })
    }
}

/// A profile update for an existing candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateUpdate {
    pub candidate_id: CandidateId,
    #[serde(flatten)]
    pub spec: CandidateSpec,
}

/// A candidate as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub dob: String,
    pub bio_link: String,
    pub image_url: String,
    pub policy: String,
    pub vote_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let Candidate {
            id,
            profile,
            vote_count,
            created_at,
        } = candidate;
        Self {
            id,
            name: profile.name,
            dob: profile.dob,
            bio_link: profile.bio_link,
            image_url: profile.image_url,
            policy: profile.policy,
            vote_count,
            created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example() -> Self {
            let profile = CandidateProfile::example();
            Self {
                name: profile.name,
                dob: profile.dob,
                bio_link: profile.bio_link,
                image_link: profile.image_url,
                policy: profile.policy,
            }
        }
    }
}
