use std::sync::Arc;

use rocket::{
    request::{self, FromRequest},
    Request, State,
};
use serde::Serialize;

use crate::{
    error::Result,
    model::{
        db::ELECTION_CLOSED,
        store::{Store, StoreHandle},
    },
};

/// The open/closed switch of the election.
///
/// Toggles are last-write-wins. The vote ledger re-reads the flag inside its
/// atomic unit, but a toggle does not wait for votes already in flight.
#[derive(Clone)]
pub struct ElectionGate {
    store: Arc<dyn Store>,
}

/// The flag before and after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateChange {
    pub previous: bool,
    pub current: bool,
}

impl ElectionGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn is_closed(&self) -> Result<bool> {
        Ok(self.store.election_property(ELECTION_CLOSED).await?)
    }

    pub async fn set_closed(&self, closed: bool) -> Result<GateChange> {
        let previous = self
            .store
            .set_election_property(ELECTION_CLOSED, closed)
            .await?;
        if previous != closed {
            info!(
                "Election {}",
                if closed { "closed" } else { "reopened" }
            );
        }
        Ok(GateChange {
            previous,
            current: closed,
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ElectionGate {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<StoreHandle>>()
            .await
            .map(|handle| Self::new(handle.store()))
    }
}
