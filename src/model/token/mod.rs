//! Stateless access tokens: an encrypted, authenticated payload naming the
//! voter and their permissions, valid until its embedded expiry.

mod authority;
mod codec;
mod guard;
mod payload;

use thiserror::Error;

pub use authority::TokenAuthority;
pub use codec::{KeyConfigurationError, TokenCodec, KEY_LENGTH, TOKEN_HEADER};
pub use guard::{access_token_cookie, Admin, AuthToken, TokenId, User, ACCESS_TOKEN_COOKIE};
pub use payload::TokenPayload;

/// Why a token was refused. Callers must not be told which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token failed to decrypt or authenticate")]
    Invalid,
    #[error("token has expired")]
    Expired,
}
