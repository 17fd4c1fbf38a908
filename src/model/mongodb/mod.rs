mod collection;
mod counter;
mod errors;
mod id;
mod retry;
mod store;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_candidate_id_counter_exists, Counter, CANDIDATE_ID_COUNTER_ID};
pub use errors::is_duplicate_key_error;
pub use id::Id;
pub use retry::TransactionRetry;
pub use store::{ensure_election_property_exists, MongoStore};
