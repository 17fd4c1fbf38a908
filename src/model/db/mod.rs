pub mod candidate;
pub mod property;
pub mod vote;
pub mod voter;

pub use candidate::{Candidate, CandidateProfile};
pub use property::{ElectionProperty, ELECTION_CLOSED};
pub use vote::{BallotRecord, Vote};
pub use voter::Voter;
