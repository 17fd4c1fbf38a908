use std::fmt::{Display, Formatter};
use std::sync::Arc;

use rocket::{
    request::{self, FromRequest},
    Request, State,
};
use serde::{Serialize, Serializer};

use crate::{
    error::Result,
    model::{
        db::Candidate,
        store::{Store, StoreHandle},
    },
};

/// A whole-number share of the total vote, rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percentage(pub u8);

impl Percentage {
    /// `part` as a percentage of `total`; zero when nobody has voted.
    pub fn of(part: u64, total: u64) -> Self {
        if total == 0 {
            return Self(0);
        }
        let percent = u128::from(part) * 100 / u128::from(total);
        Self(u8::try_from(percent).unwrap_or(100))
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A candidate's standing in the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub percentage: Percentage,
}

/// Rank candidates by votes, most first, ties broken by candidate ID.
pub fn rank(mut candidates: Vec<Candidate>) -> Vec<CandidateResult> {
    let total: u64 = candidates.iter().map(|c| c.vote_count).sum();
    candidates.sort_by(|a, b| b.vote_count.cmp(&a.vote_count).then(a.id.cmp(&b.id)));
    candidates
        .into_iter()
        .map(|candidate| CandidateResult {
            percentage: Percentage::of(candidate.vote_count, total),
            candidate,
        })
        .collect()
}

/// Derives election results from the current tallies. Not synchronised with
/// votes in flight.
#[derive(Clone)]
pub struct ResultAggregator {
    store: Arc<dyn Store>,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn compute_results(&self) -> Result<Vec<CandidateResult>> {
        Ok(rank(self.store.candidate_tallies().await?))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ResultAggregator {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<StoreHandle>>()
            .await
            .map(|handle| Self::new(handle.store()))
    }
}
