mod candidate_id;
mod national_id;
mod permission;

pub use candidate_id::CandidateId;
pub use national_id::{InvalidNationalId, NationalId, NATIONAL_ID_LENGTH};
pub use permission::Permission;
