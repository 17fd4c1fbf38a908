//! API-compatible types.
//!
//! Request bodies are validated while they are converted into model types;
//! responses use plain JSON names and RFC 3339 datetimes.

pub mod auth;
pub mod candidate;
pub mod election;
pub mod pagination;
pub mod vote;

use serde::Serialize;

/// The body of a successful request that has nothing else to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub status: &'static str,
}

impl Default for Acknowledgement {
    fn default() -> Self {
        Self { status: "ok" }
    }
}
