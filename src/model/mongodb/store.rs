use mongodb::{
    bson::doc,
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{
        Acknowledgment, FindOneAndUpdateOptions, FindOptions, ReadConcern, ReturnDocument,
        TransactionOptions, UpdateOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::futures::{
    stream::{BoxStream, StreamExt},
    TryStreamExt,
};

use crate::model::{
    common::{CandidateId, NationalId},
    db::{BallotRecord, Candidate, CandidateProfile, ElectionProperty, Vote, Voter, ELECTION_CLOSED},
    store::{DeleteOutcome, RecordOutcome, Store, StoreError, StoreResult},
};

use super::{is_duplicate_key_error, Coll, Counter, TransactionRetry, CANDIDATE_ID_COUNTER_ID};

/// A [`Store`] backed by a MongoDB replica set (transactions are required).
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    properties: Coll<ElectionProperty>,
    counters: Coll<Counter>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            voters: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
            properties: Coll::from_db(db),
            counters: Coll::from_db(db),
        }
    }

    fn transaction_options() -> TransactionOptions {
        TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build()
    }

    /// The body of the vote transaction. The first write takes the voter's
    /// document lock, so a concurrent transaction for the same voter aborts
    /// with a write conflict and is retried against the committed state.
    async fn record_vote_in(
        &self,
        session: &mut ClientSession,
        national_id: &NationalId,
        candidate_id: CandidateId,
    ) -> Result<RecordOutcome, DbError> {
        let marked = self
            .voters
            .update_one_with_session(
                doc! { "_id": national_id.as_str(), "has_voted": false },
                doc! { "$set": { "has_voted": true } },
                None,
                session,
            )
            .await?;
        if marked.matched_count == 0 {
            let exists = self
                .voters
                .find_one_with_session(doc! { "_id": national_id.as_str() }, None, session)
                .await?
                .is_some();
            return Ok(if exists {
                RecordOutcome::AlreadyVoted
            } else {
                RecordOutcome::VoterMissing
            });
        }

        let closed = self
            .properties
            .find_one_with_session(doc! { "_id": ELECTION_CLOSED }, None, session)
            .await?
            .map(|property| property.value)
            // Unseeded flag: refuse rather than accept votes on an unknown state.
            .unwrap_or(true);
        if closed {
            return Ok(RecordOutcome::ElectionClosed);
        }

        let tallied = self
            .candidates
            .update_one_with_session(
                doc! { "_id": candidate_id },
                doc! { "$inc": { "vote_count": 1_i64 } },
                None,
                session,
            )
            .await?;
        if tallied.matched_count == 0 {
            return Ok(RecordOutcome::CandidateMissing);
        }

        let vote = Vote::new(national_id.clone(), candidate_id);
        match self
            .votes
            .insert_one_with_session(&vote, None, session)
            .await
        {
            Ok(_) => Ok(RecordOutcome::Recorded(vote)),
            Err(e) if is_duplicate_key_error(&e) => Ok(RecordOutcome::AlreadyVoted),
            Err(e) => Err(e),
        }
    }

    /// Commit, retrying while the outcome of the commit itself is unknown.
    ///
    /// The outer error is the retry budget running out; the inner one is the
    /// commit failing for any other reason.
    async fn commit(
        session: &mut ClientSession,
        retry: &mut TransactionRetry,
    ) -> StoreResult<Result<(), DbError>> {
        loop {
            match session.commit_transaction().await {
                Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                    debug!("Commit result unknown after attempt {}: {e}", retry.attempts());
                    retry.wait().await?;
                }
                result => return Ok(result),
            }
        }
    }

    /// Whether a failed transaction should be run again from the start.
    fn is_transient(e: &DbError) -> bool {
        e.contains_label(TRANSIENT_TRANSACTION_ERROR)
    }

    /// Abort, ignoring failures: the server discards a transaction that is
    /// never committed.
    async fn abort(session: &mut ClientSession) {
        if let Err(e) = session.abort_transaction().await {
            debug!("Abort of transaction failed: {e}");
        }
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_voter(&self, voter: Voter) -> StoreResult<Voter> {
        match self.voters.insert_one(&voter, None).await {
            Ok(_) => Ok(voter),
            Err(e) if is_duplicate_key_error(&e) => Err(StoreError::Duplicate(format!(
                "voter {}",
                voter.national_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_voter(&self, national_id: &NationalId) -> StoreResult<Option<Voter>> {
        Ok(self
            .voters
            .find_one(doc! { "_id": national_id.as_str() }, None)
            .await?)
    }

    async fn insert_candidate(&self, profile: CandidateProfile) -> StoreResult<Candidate> {
        let mut session = self.client.start_session(None).await?;
        let mut retry = TransactionRetry::new();

        loop {
            session
                .start_transaction(Self::transaction_options())
                .await?;

            let result = match Counter::next(&self.counters, CANDIDATE_ID_COUNTER_ID, &mut session)
                .await
            {
                Ok(id) => {
                    let candidate = Candidate::new(CandidateId(id), profile.clone());
                    match self
                        .candidates
                        .insert_one_with_session(&candidate, None, &mut session)
                        .await
                    {
                        Ok(_) => Self::commit(&mut session, &mut retry)
                            .await?
                            .map(|()| candidate),
                        Err(e) => {
                            Self::abort(&mut session).await;
                            Err(e)
                        }
                    }
                }
                Err(StoreError::Db(e)) => {
                    Self::abort(&mut session).await;
                    Err(e)
                }
                Err(e) => {
                    Self::abort(&mut session).await;
                    return Err(e);
                }
            };

            match result {
                Err(e) if Self::is_transient(&e) => {
                    debug!(
                        "Candidate transaction attempt {} hit a transient error: {e}",
                        retry.attempts()
                    );
                    retry.wait().await?;
                }
                result => return Ok(result?),
            }
        }
    }

    async fn find_candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        Ok(self.candidates.find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_candidates(&self, skip: u64, limit: u64) -> StoreResult<Vec<Candidate>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        Ok(self
            .candidates
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn update_candidate(
        &self,
        id: CandidateId,
        profile: CandidateProfile,
    ) -> StoreResult<Option<Candidate>> {
        let update = doc! {
            "$set": {
                "name": profile.name,
                "dob": profile.dob,
                "bio_link": profile.bio_link,
                "image_url": profile.image_url,
                "policy": profile.policy,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .candidates
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?)
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<DeleteOutcome> {
        let result = self
            .candidates
            .delete_one(doc! { "_id": id, "vote_count": 0_i64 }, None)
            .await?;
        if result.deleted_count == 1 {
            return Ok(DeleteOutcome::Deleted);
        }
        match self.find_candidate(id).await? {
            Some(_) => Ok(DeleteOutcome::HasVotes),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn record_vote(
        &self,
        national_id: &NationalId,
        candidate_id: CandidateId,
    ) -> StoreResult<RecordOutcome> {
        let mut session = self.client.start_session(None).await?;
        let mut retry = TransactionRetry::new();

        loop {
            session
                .start_transaction(Self::transaction_options())
                .await?;

            let result = match self
                .record_vote_in(&mut session, national_id, candidate_id)
                .await
            {
                Ok(RecordOutcome::Recorded(vote)) => Self::commit(&mut session, &mut retry)
                    .await?
                    .map(|()| RecordOutcome::Recorded(vote)),
                Ok(rejected) => {
                    Self::abort(&mut session).await;
                    return Ok(rejected);
                }
                Err(e) => {
                    Self::abort(&mut session).await;
                    Err(e)
                }
            };

            match result {
                Err(e) if Self::is_transient(&e) => {
                    debug!(
                        "Vote transaction attempt {} hit a transient error: {e}",
                        retry.attempts()
                    );
                    retry.wait().await?;
                }
                result => return Ok(result?),
            }
        }
    }

    async fn election_property(&self, name: &str) -> StoreResult<bool> {
        self.properties
            .find_one(doc! { "_id": name }, None)
            .await?
            .map(|property| property.value)
            .ok_or_else(|| StoreError::MissingProperty(name.to_string()))
    }

    async fn set_election_property(&self, name: &str, value: bool) -> StoreResult<bool> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        self.properties
            .find_one_and_update(
                doc! { "_id": name },
                doc! { "$set": { "value": value } },
                options,
            )
            .await?
            .map(|property| property.value)
            .ok_or_else(|| StoreError::MissingProperty(name.to_string()))
    }

    async fn candidate_tallies(&self) -> StoreResult<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        Ok(self
            .candidates
            .find(None, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn ballot_records(&self) -> StoreResult<BoxStream<'static, StoreResult<BallotRecord>>> {
        let options = FindOptions::builder()
            .sort(doc! { "candidate_id": 1, "created_at": 1 })
            .build();
        let cursor = self.votes.find(None, options).await?;
        Ok(cursor
            .map(|vote| vote.map(BallotRecord::from).map_err(StoreError::from))
            .boxed())
    }
}

/// Ensure the election-closed flag exists, seeding it as open.
///
/// This operation is idempotent and never changes an existing value.
pub async fn ensure_election_property_exists(
    properties: &Coll<ElectionProperty>,
) -> Result<(), DbError> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    properties
        .update_one(
            doc! { "_id": ELECTION_CLOSED },
            doc! { "$setOnInsert": { "value": false } },
            upsert,
        )
        .await?;
    Ok(())
}
