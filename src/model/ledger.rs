//! One vote per voter, never while the election is closed.

use std::sync::Arc;

use rocket::{
    request::{self, FromRequest},
    Request, State,
};

use crate::{
    error::{Error, Result},
    model::{
        common::{CandidateId, NationalId},
        db::{Vote, ELECTION_CLOSED},
        store::{RecordOutcome, Store, StoreHandle},
    },
};

pub const ALREADY_VOTED: &str = "already voted";
pub const ELECTION_IS_CLOSED: &str = "election closed";
pub const NOT_YOUR_IDENTITY: &str = "cannot vote on behalf of another identity";

/// Casts and checks votes. Holds no state of its own.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn Store>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Cast a vote for `candidate` on behalf of `target`, as the authenticated
    /// `caller`.
    ///
    /// Checks, in order: the target voter exists, the caller is the target, the
    /// target has not voted, the election is open. The store then re-verifies
    /// every check while atomically recording the vote, so a racing request
    /// never gets a second vote through.
    pub async fn cast_vote(
        &self,
        caller: &NationalId,
        target: &NationalId,
        candidate: CandidateId,
    ) -> Result<Vote> {
        let voter = self
            .store
            .find_voter(target)
            .await?
            .ok_or_else(voter_not_found)?;

        if &voter.national_id != caller {
            return Err(Error::Forbidden(NOT_YOUR_IDENTITY.to_string()));
        }

        if voter.has_voted {
            return Err(Error::Conflict(ALREADY_VOTED.to_string()));
        }

        if self.store.election_property(ELECTION_CLOSED).await? {
            return Err(Error::Conflict(ELECTION_IS_CLOSED.to_string()));
        }

        match self.store.record_vote(target, candidate).await? {
            RecordOutcome::Recorded(vote) => {
                info!("Recorded vote {} for candidate {candidate}", vote.id);
                Ok(vote)
            }
            RecordOutcome::VoterMissing => Err(voter_not_found()),
            RecordOutcome::AlreadyVoted => Err(Error::Conflict(ALREADY_VOTED.to_string())),
            RecordOutcome::ElectionClosed => Err(Error::Conflict(ELECTION_IS_CLOSED.to_string())),
            RecordOutcome::CandidateMissing => {
                Err(Error::NotFound(format!("candidate {candidate} not found")))
            }
        }
    }

    /// Has the given voter already voted?
    pub async fn check_vote_status(&self, national_id: &NationalId) -> Result<bool> {
        self.store
            .find_voter(national_id)
            .await?
            .map(|voter| voter.has_voted)
            .ok_or_else(voter_not_found)
    }
}

fn voter_not_found() -> Error {
    Error::NotFound("voter not found".to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoteLedger {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<StoreHandle>>()
            .await
            .map(|handle| Self::new(handle.store()))
    }
}

#[cfg(test)]
mod tests {
    use rocket::futures::TryStreamExt;

    use crate::model::{
        db::{CandidateProfile, Voter},
        store::MemoryStore,
    };

    use super::*;

    async fn setup() -> (MemoryStore, VoteLedger, NationalId, CandidateId) {
        setup_with(MemoryStore::new()).await
    }

    async fn setup_with(store: MemoryStore) -> (MemoryStore, VoteLedger, NationalId, CandidateId) {
        let voter = store.with_voter(Voter::example()).await;
        let candidate = store
            .insert_candidate(CandidateProfile::example())
            .await
            .unwrap()
            .id;
        let ledger = VoteLedger::new(Arc::new(store.clone()));
        (store, ledger, voter, candidate)
    }

    async fn tally(store: &MemoryStore, candidate: CandidateId) -> u64 {
        store
            .find_candidate(candidate)
            .await
            .unwrap()
            .unwrap()
            .vote_count
    }

    fn assert_conflict(result: Result<Vote>, expected: &str) {
        match result {
            Err(Error::Conflict(msg)) => assert_eq!(expected, msg),
            other => panic!("expected conflict `{expected}`, got {other:?}"),
        }
    }

    #[rocket::async_test]
    async fn first_vote_succeeds() {
        let (store, ledger, voter, candidate) = setup().await;

        let vote = ledger.cast_vote(&voter, &voter, candidate).await.unwrap();

        assert_eq!(voter, vote.national_id);
        assert_eq!(candidate, vote.candidate_id);
        assert!(ledger.check_vote_status(&voter).await.unwrap());
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[rocket::async_test]
    async fn second_vote_conflicts() {
        let (store, ledger, voter, candidate) = setup().await;
        ledger.cast_vote(&voter, &voter, candidate).await.unwrap();

        assert_conflict(
            ledger.cast_vote(&voter, &voter, candidate).await,
            ALREADY_VOTED,
        );
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[rocket::async_test]
    async fn closed_election_conflicts() {
        let (store, ledger, _, candidate) = setup().await;
        let voter = store.with_voter(Voter::example2()).await;
        store
            .set_election_property(ELECTION_CLOSED, true)
            .await
            .unwrap();

        assert_conflict(
            ledger.cast_vote(&voter, &voter, candidate).await,
            ELECTION_IS_CLOSED,
        );
        assert_eq!(0, tally(&store, candidate).await);
        assert!(!ledger.check_vote_status(&voter).await.unwrap());
    }

    #[rocket::async_test]
    async fn already_voted_reported_before_closed() {
        let (store, ledger, voter, candidate) = setup().await;
        ledger.cast_vote(&voter, &voter, candidate).await.unwrap();
        store
            .set_election_property(ELECTION_CLOSED, true)
            .await
            .unwrap();

        assert_conflict(
            ledger.cast_vote(&voter, &voter, candidate).await,
            ALREADY_VOTED,
        );
    }

    #[rocket::async_test]
    async fn other_identity_forbidden() {
        let (store, ledger, caller, candidate) = setup().await;
        let target = store.with_voter(Voter::example2()).await;

        let result = ledger.cast_vote(&caller, &target, candidate).await;

        assert!(matches!(result, Err(Error::Forbidden(msg)) if msg == NOT_YOUR_IDENTITY));
        assert!(!ledger.check_vote_status(&target).await.unwrap());
        assert!(!ledger.check_vote_status(&caller).await.unwrap());
        assert_eq!(0, tally(&store, candidate).await);
    }

    #[rocket::async_test]
    async fn unknown_voter_not_found() {
        let (_, ledger, caller, candidate) = setup().await;
        let stranger = Voter::example2().national_id;

        assert!(matches!(
            ledger.cast_vote(&caller, &stranger, candidate).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ledger.check_vote_status(&stranger).await,
            Err(Error::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn unknown_candidate_not_found() {
        let (store, ledger, voter, _) = setup().await;

        assert!(matches!(
            ledger.cast_vote(&voter, &voter, CandidateId(404)).await,
            Err(Error::NotFound(_))
        ));
        assert!(!ledger.check_vote_status(&voter).await.unwrap());
        assert_eq!(
            0,
            store
                .ballot_records()
                .await
                .unwrap()
                .try_collect::<Vec<_>>()
                .await
                .unwrap()
                .len()
        );
    }

    #[backend_test]
    async fn concurrent_votes_by_one_voter(store: MemoryStore) {
        const ATTEMPTS: usize = 32;
        let (store, ledger, voter, candidate) = setup_with(store).await;

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let ledger = ledger.clone();
                let voter = voter.clone();
                rocket::tokio::spawn(async move { ledger.cast_vote(&voter, &voter, candidate).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                conflict => assert_conflict(conflict, ALREADY_VOTED),
            }
        }

        assert_eq!(1, accepted);
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[backend_test]
    async fn concurrent_votes_by_distinct_voters(store: MemoryStore) {
        const VOTERS: usize = 64;
        let (store, ledger, voter, candidate) = setup_with(store).await;
        ledger.cast_vote(&voter, &voter, candidate).await.unwrap();
        let before = tally(&store, candidate).await;

        let mut ids = Vec::with_capacity(VOTERS);
        for voter in Voter::examples(VOTERS) {
            ids.push(store.with_voter(voter).await);
        }

        let handles: Vec<_> = ids
            .into_iter()
            .map(|voter| {
                let ledger = ledger.clone();
                rocket::tokio::spawn(async move { ledger.cast_vote(&voter, &voter, candidate).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(before + VOTERS as u64, tally(&store, candidate).await);
    }
}
