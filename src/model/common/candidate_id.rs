use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{self, Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// Auto-incremented candidate identifier. Valid IDs start at 1.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub i64);

impl Display for CandidateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CandidateId> for Bson {
    fn from(id: CandidateId) -> Self {
        Bson::Int64(id.0)
    }
}

impl<'a> FromParam<'a> for CandidateId {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        match param.parse::<i64>() {
            Ok(id) if id >= 1 => Ok(Self(id)),
            _ => Err(param),
        }
    }
}

impl UriDisplay<Path> for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_, Path>) -> std::fmt::Result {
        f.write_value(self.0)
    }
}

impl_from_uri_param_identity!([Path] CandidateId);
