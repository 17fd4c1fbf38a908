use std::io::Cursor;

use rocket::{
    http::{ContentType, Status, StatusClass},
    response::{self, Responder},
    serde::json::serde_json::json,
    Request, Response,
};
use thiserror::Error;

use crate::{
    logging::RequestId,
    model::{
        store::StoreError,
        token::{KeyConfigurationError, TokenError},
    },
};

pub type Result<T> = std::result::Result<T, Error>;

/// Why a caller could not be authenticated. Only ever logged; every variant
/// looks the same from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no access token")]
    MissingToken,
    #[error("invalid access token")]
    InvalidToken,
    #[error("expired access token")]
    ExpiredToken,
    #[error("bad credentials")]
    BadCredentials,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => Self::InvalidToken,
            TokenError::Expired => Self::ExpiredToken,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(StoreError),
    #[error(transparent)]
    KeyConfiguration(#[from] KeyConfigurationError),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => Self::Conflict(format!("{what} already exists")),
            e => Self::Storage(e),
        }
    }
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
            Self::Storage(_) | Self::KeyConfiguration(_) => Status::InternalServerError,
        }
    }

    /// The message clients see.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Unauthorized(_) => "unauthorized".to_string(),
            Self::Storage(_) | Self::KeyConfiguration(_) => "internal server error".to_string(),
        }
    }
}

/// The JSON body shared by errors and catchers.
pub fn error_body(message: &str) -> String {
    json!({ "status": "error", "error": message }).to_string()
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestId::of(req);
        match status.class() {
            StatusClass::ServerError => error!("req{id} {self}"),
            _ => warn!("req{id} {self}"),
        }

        let body = error_body(&self.public_message());
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
