use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::model::{
    mongodb::Coll,
    store::{StoreError, StoreResult},
};

/// ID of the counter that allocates candidate IDs.
pub const CANDIDATE_ID_COUNTER_ID: &str = "candidate_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: i64,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    pub fn new(id: impl Into<String>, start: i64) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(
        counters: &Coll<Counter>,
        id: &str,
        session: &mut ClientSession,
    ) -> StoreResult<i64> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! { "_id": id }, update, options, session)
            .await?
            .ok_or_else(|| StoreError::MissingProperty(id.to_string()))?;
        Ok(counter.next)
    }
}

/// Ensure the candidate ID counter exists, starting at 1.
///
/// This operation is idempotent.
pub async fn ensure_candidate_id_counter_exists(counters: &Coll<Counter>) -> Result<(), DbError> {
    let counter = Counter::new(CANDIDATE_ID_COUNTER_ID, 1);
    let upsert = UpdateOptions::builder().upsert(true).build();
    counters
        .update_one(
            doc! { "_id": CANDIDATE_ID_COUNTER_ID },
            doc! { "$setOnInsert": { "next": counter.next } },
            upsert,
        )
        .await?;
    Ok(())
}
