use serde::{Deserialize, Serialize};

use crate::model::{
    api::candidate::CandidateDescription,
    gate::GateChange,
    results::{CandidateResult, Percentage},
};

/// Open (`enable: true`) or close the election.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub enable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub status: &'static str,
    pub enable: bool,
}

impl From<GateChange> for ToggleResponse {
    fn from(change: GateChange) -> Self {
        Self {
            status: "ok",
            enable: !change.current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionState {
    pub closed: bool,
}

/// One row of the published results.
#[derive(Debug, Clone, Serialize)]
pub struct ResultDescription {
    #[serde(flatten)]
    pub candidate: CandidateDescription,
    pub percentage: Percentage,
}

impl From<CandidateResult> for ResultDescription {
    fn from(result: CandidateResult) -> Self {
        Self {
            candidate: result.candidate.into(),
            percentage: result.percentage,
        }
    }
}
