//! The persistence interface consumed by the ledger, the election gate and
//! the HTTP boundary.

mod memory;

use std::sync::Arc;

use rocket::futures::stream::BoxStream;
use thiserror::Error;

use crate::model::{
    common::{CandidateId, NationalId},
    db::{BallotRecord, Candidate, CandidateProfile, Vote, Voter},
};

pub use memory::MemoryStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Infrastructure failures of a [`Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error("Duplicate key: {0}")]
    Duplicate(String),
    #[error("Election property '{0}' has not been seeded")]
    MissingProperty(String),
    #[error("Gave up on contended transaction after {0} attempts")]
    Contended(usize),
}

/// The result of an atomic attempt to record a vote.
///
/// Everything except [`RecordOutcome::Recorded`] leaves the store untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(Vote),
    VoterMissing,
    AlreadyVoted,
    ElectionClosed,
    CandidateMissing,
}

/// The result of an attempt to delete a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Candidates that already hold votes are never removed.
    HasVotes,
}

/// Voter, candidate, vote and election-property persistence.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Insert a new voter. Fails with [`StoreError::Duplicate`] if the national
    /// ID is already registered.
    async fn insert_voter(&self, voter: Voter) -> StoreResult<Voter>;

    async fn find_voter(&self, national_id: &NationalId) -> StoreResult<Option<Voter>>;

    /// Insert a new candidate under a freshly allocated ID, with no votes.
    async fn insert_candidate(&self, profile: CandidateProfile) -> StoreResult<Candidate>;

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>>;

    /// Candidates in ID order.
    async fn list_candidates(&self, skip: u64, limit: u64) -> StoreResult<Vec<Candidate>>;

    /// Replace the profile of an existing candidate, leaving its tally alone.
    async fn update_candidate(
        &self,
        id: CandidateId,
        profile: CandidateProfile,
    ) -> StoreResult<Option<Candidate>>;

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<DeleteOutcome>;

    /// Atomically mark the voter as voted, insert their vote and increment the
    /// candidate's tally.
    ///
    /// The voter's `has_voted` flag, the election-closed flag and the candidate
    /// are re-checked inside the same atomic unit, so concurrent calls for one
    /// voter yield exactly one [`RecordOutcome::Recorded`]. Calls for distinct
    /// voters must not serialise on each other beyond the candidate counter.
    async fn record_vote(
        &self,
        national_id: &NationalId,
        candidate_id: CandidateId,
    ) -> StoreResult<RecordOutcome>;

    async fn election_property(&self, name: &str) -> StoreResult<bool>;

    /// Set a property, returning its previous value.
    async fn set_election_property(&self, name: &str, value: bool) -> StoreResult<bool>;

    /// Every candidate with its current tally, in ID order.
    async fn candidate_tallies(&self) -> StoreResult<Vec<Candidate>>;

    /// All votes as ballot records, ordered by candidate then by time cast.
    /// The stream is read lazily and cannot be restarted.
    async fn ballot_records(&self) -> StoreResult<BoxStream<'static, StoreResult<BallotRecord>>>;
}

/// The store shared by every request, placed into Rocket's managed state.
#[derive(Clone)]
pub struct StoreHandle(Arc<dyn Store>);

impl StoreHandle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self(store)
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.0.clone()
    }
}
