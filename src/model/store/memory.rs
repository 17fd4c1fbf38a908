use std::collections::{BTreeMap, HashMap};
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use rocket::{
    futures::{
        stream::{self, BoxStream},
        StreamExt,
    },
    tokio::sync::{Mutex, RwLock},
};

use crate::model::{
    common::{CandidateId, NationalId},
    db::{BallotRecord, Candidate, CandidateProfile, Vote, Voter, ELECTION_CLOSED},
};

use super::{DeleteOutcome, RecordOutcome, Store, StoreError, StoreResult};

/// An in-process [`Store`].
///
/// Every voter row and every candidate counter sits behind its own lock, so
/// recording a vote serialises only against the same voter (for the whole
/// check-and-write) and the same candidate (for the increment). The outer maps
/// are only write-locked to add or remove rows.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    voters: RwLock<HashMap<NationalId, Arc<Mutex<Voter>>>>,
    candidates: RwLock<BTreeMap<CandidateId, Arc<Mutex<Candidate>>>>,
    votes: Mutex<Vec<Vote>>,
    properties: RwLock<HashMap<String, bool>>,
    last_candidate_id: AtomicI64,
}

impl MemoryStore {
    /// An empty store with the election open.
    pub fn new() -> Self {
        let properties = HashMap::from([(ELECTION_CLOSED.to_string(), false)]);
        let inner = Inner {
            properties: RwLock::new(properties),
            ..Default::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    async fn voter_row(&self, national_id: &NationalId) -> Option<Arc<Mutex<Voter>>> {
        self.inner.voters.read().await.get(national_id).cloned()
    }

    async fn candidate_row(&self, id: CandidateId) -> Option<Arc<Mutex<Candidate>>> {
        self.inner.candidates.read().await.get(&id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_voter(&self, voter: Voter) -> StoreResult<Voter> {
        let mut voters = self.inner.voters.write().await;
        if voters.contains_key(&voter.national_id) {
            return Err(StoreError::Duplicate(format!(
                "voter {}",
                voter.national_id
            )));
        }
        voters.insert(
            voter.national_id.clone(),
            Arc::new(Mutex::new(voter.clone())),
        );
        Ok(voter)
    }

    async fn find_voter(&self, national_id: &NationalId) -> StoreResult<Option<Voter>> {
        match self.voter_row(national_id).await {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn insert_candidate(&self, profile: CandidateProfile) -> StoreResult<Candidate> {
        let id = CandidateId(self.inner.last_candidate_id.fetch_add(1, Ordering::Relaxed) + 1);
        let candidate = Candidate::new(id, profile);
        self.inner
            .candidates
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(candidate.clone())));
        Ok(candidate)
    }

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        match self.candidate_row(id).await {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_candidates(&self, skip: u64, limit: u64) -> StoreResult<Vec<Candidate>> {
        let candidates = self.inner.candidates.read().await;
        let mut page = Vec::new();
        for row in candidates
            .values()
            .skip(skip as usize)
            .take(limit as usize)
        {
            page.push(row.lock().await.clone());
        }
        Ok(page)
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        profile: CandidateProfile,
    ) -> StoreResult<Option<Candidate>> {
        match self.candidate_row(id).await {
            Some(row) => {
                let mut candidate = row.lock().await;
                candidate.profile = profile;
                Ok(Some(candidate.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<DeleteOutcome> {
        // The write lock keeps `record_vote` from reaching this candidate meanwhile.
        let mut candidates = self.inner.candidates.write().await;
        let has_votes = match candidates.get(&id) {
            Some(row) => row.lock().await.vote_count > 0,
            None => return Ok(DeleteOutcome::NotFound),
        };
        if has_votes {
            return Ok(DeleteOutcome::HasVotes);
        }
        candidates.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn record_vote(
        &self,
        national_id: &NationalId,
        candidate_id: CandidateId,
    ) -> StoreResult<RecordOutcome> {
        let row = match self.voter_row(national_id).await {
            Some(row) => row,
            None => return Ok(RecordOutcome::VoterMissing),
        };
        // Row lock on the voter, held until the vote is fully recorded.
        let mut voter = row.lock().await;
        if voter.has_voted {
            return Ok(RecordOutcome::AlreadyVoted);
        }

        if self.election_property(ELECTION_CLOSED).await? {
            return Ok(RecordOutcome::ElectionClosed);
        }

        let candidates = self.inner.candidates.read().await;
        let candidate = match candidates.get(&candidate_id) {
            Some(candidate) => candidate,
            None => return Ok(RecordOutcome::CandidateMissing),
        };

        // Nothing below can fail, so the three writes land together.
        let vote = Vote::new(national_id.clone(), candidate_id);
        candidate.lock().await.vote_count += 1;
        self.inner.votes.lock().await.push(vote.clone());
        voter.has_voted = true;

        Ok(RecordOutcome::Recorded(vote))
    }

    async fn election_property(&self, name: &str) -> StoreResult<bool> {
        self.inner
            .properties
            .read()
            .await
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::MissingProperty(name.to_string()))
    }

    async fn set_election_property(&self, name: &str, value: bool) -> StoreResult<bool> {
        self.inner
            .properties
            .write()
            .await
            .get_mut(name)
            .map(|current| std::mem::replace(current, value))
            .ok_or_else(|| StoreError::MissingProperty(name.to_string()))
    }

    async fn candidate_tallies(&self) -> StoreResult<Vec<Candidate>> {
        let candidates = self.inner.candidates.read().await;
        let mut tallies = Vec::with_capacity(candidates.len());
        for row in candidates.values() {
            tallies.push(row.lock().await.clone());
        }
        Ok(tallies)
    }

    async fn ballot_records(&self) -> StoreResult<BoxStream<'static, StoreResult<BallotRecord>>> {
        let mut votes = self.inner.votes.lock().await.clone();
        votes.sort_by(|a, b| {
            a.candidate_id
                .cmp(&b.candidate_id)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(stream::iter(votes.into_iter().map(|vote| Ok(BallotRecord::from(vote)))).boxed())
    }
}


#[cfg(test)]
mod tests {
    use rocket::futures::TryStreamExt;

    use super::*;

    #[rocket::async_test]
    async fn election_starts_open() {
        let store = MemoryStore::new();
        assert!(!store.election_property(ELECTION_CLOSED).await.unwrap());
        assert!(matches!(
            store.election_property("unknown").await,
            Err(StoreError::MissingProperty(_))
        ));
    }

    #[rocket::async_test]
    async fn set_property_returns_previous() {
        let store = MemoryStore::new();
        assert!(!store.set_election_property(ELECTION_CLOSED, true).await.unwrap());
        assert!(store.set_election_property(ELECTION_CLOSED, true).await.unwrap());
        assert!(store.election_property(ELECTION_CLOSED).await.unwrap());
    }

    #[rocket::async_test]
    async fn duplicate_voter_rejected() {
        let store = MemoryStore::new();
        store.insert_voter(Voter::example()).await.unwrap();
        assert!(matches!(
            store.insert_voter(Voter::example()).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[rocket::async_test]
    async fn candidate_ids_increment_from_one() {
        let store = MemoryStore::new();
        let first = store.insert_candidate(CandidateProfile::example()).await.unwrap();
        let second = store.insert_candidate(CandidateProfile::example2()).await.unwrap();
        assert_eq!(first.id, CandidateId(1));
        assert_eq!(second.id, CandidateId(2));
        assert_eq!(first.vote_count, 0);

        let page = store.list_candidates(1, 10).await.unwrap();
        assert_eq!(page, vec![second]);
    }

    #[rocket::async_test]
    async fn update_keeps_tally() {
        let store = MemoryStore::new();
        let voter = store.with_voter(Voter::example()).await;
        let candidate = store.insert_candidate(CandidateProfile::example()).await.unwrap();
        store.record_vote(&voter, candidate.id).await.unwrap();

        let updated = store
            .update_candidate(candidate.id, CandidateProfile::example2())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.profile, CandidateProfile::example2());
        assert_eq!(updated.vote_count, 1);
        assert_eq!(
            store
                .update_candidate(CandidateId(99), CandidateProfile::example())
                .await
                .unwrap(),
            None
        );
    }

    #[rocket::async_test]
    async fn candidates_with_votes_are_kept() {
        let store = MemoryStore::new();
        let voter = store.with_voter(Voter::example()).await;
        let voted = store.insert_candidate(CandidateProfile::example()).await.unwrap();
        let spare = store.insert_candidate(CandidateProfile::example2()).await.unwrap();
        store.record_vote(&voter, voted.id).await.unwrap();

        assert_eq!(store.delete_candidate(voted.id).await.unwrap(), DeleteOutcome::HasVotes);
        assert_eq!(store.delete_candidate(spare.id).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete_candidate(spare.id).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[rocket::async_test]
    async fn record_vote_writes_all_three() {
        let store = MemoryStore::new();
        let voter = store.with_voter(Voter::example()).await;
        let candidate = store.insert_candidate(CandidateProfile::example()).await.unwrap();

        let outcome = store.record_vote(&voter, candidate.id).await.unwrap();
        let vote = match outcome {
            RecordOutcome::Recorded(vote) => vote,
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(vote.national_id, voter);
        assert_eq!(vote.candidate_id, candidate.id);

        assert!(store.find_voter(&voter).await.unwrap().unwrap().has_voted);
        assert_eq!(
            store.find_candidate(candidate.id).await.unwrap().unwrap().vote_count,
            1
        );
        let records: Vec<_> = store.ballot_records().await.unwrap().try_collect().await.unwrap();
        assert_eq!(records, vec![BallotRecord::from(vote)]);
    }

    #[rocket::async_test]
    async fn rejected_votes_change_nothing() {
        let store = MemoryStore::new();
        let voter = store.with_voter(Voter::example()).await;
        let candidate = store.insert_candidate(CandidateProfile::example()).await.unwrap();

        assert_eq!(
            store.record_vote(&voter, CandidateId(42)).await.unwrap(),
            RecordOutcome::CandidateMissing
        );
        assert_eq!(
            store
                .record_vote(&Voter::example_admin().national_id, candidate.id)
                .await
                .unwrap(),
            RecordOutcome::VoterMissing
        );
        store.set_election_property(ELECTION_CLOSED, true).await.unwrap();
        assert_eq!(
            store.record_vote(&voter, candidate.id).await.unwrap(),
            RecordOutcome::ElectionClosed
        );

        assert!(!store.find_voter(&voter).await.unwrap().unwrap().has_voted);
        assert_eq!(store.candidate_tallies().await.unwrap()[0].vote_count, 0);
        assert_eq!(store.ballot_records().await.unwrap().count().await, 0);
    }

    #[rocket::async_test]
    async fn ballot_records_ordered_by_candidate() {
        let store = MemoryStore::new();
        let first = store.insert_candidate(CandidateProfile::example()).await.unwrap();
        let second = store.insert_candidate(CandidateProfile::example2()).await.unwrap();
        let voters = Voter::examples(3);
        for voter in &voters {
            store.insert_voter(voter.clone()).await.unwrap();
        }
        store.record_vote(&voters[0].national_id, second.id).await.unwrap();
        store.record_vote(&voters[1].national_id, first.id).await.unwrap();
        store.record_vote(&voters[2].national_id, second.id).await.unwrap();

        let records: Vec<_> = store.ballot_records().await.unwrap().try_collect().await.unwrap();
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.candidate_id, r.national_id.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                (first.id, voters[1].national_id.clone()),
                (second.id, voters[0].national_id.clone()),
                (second.id, voters[2].national_id.clone()),
            ]
        );
    }
}
