use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    Request,
};
use uuid::Uuid;

use crate::{
    error::AuthError,
    model::{
        common::{NationalId, Permission},
        db::Voter,
    },
};

use super::{TokenAuthority, TokenPayload};

/// Cookie set at login, used when no `Authorization` header is present.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// A kind of caller, identified by the permission its token must carry.
pub trait User {
    const PERMISSION: Permission;
}

impl User for Voter {
    const PERMISSION: Permission = Permission::Vote;
}

/// Marker for routes restricted to administrators.
pub struct Admin;

impl User for Admin {
    const PERMISSION: Permission = Permission::Admin;
}

/// The ID of the token that authenticated the current request, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenId(pub Uuid);

/// A verified access token whose holder is entitled to act as a `U`.
pub struct AuthToken<U> {
    payload: TokenPayload,
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// The authenticated caller identity.
    pub fn national_id(&self) -> &NationalId {
        &self.payload.national_id
    }

    pub fn payload(&self) -> &TokenPayload {
        &self.payload
    }
}

/// Build the login cookie for an issued token.
pub fn access_token_cookie(token: String, expired_at: DateTime<Utc>) -> Cookie<'static> {
    let max_age = (expired_at - Utc::now()).num_seconds().max(0);
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(rocket::time::Duration::seconds(max_age))
        .build()
}

/// The raw token, from the `Authorization: Bearer` header or else the cookie.
fn raw_token<'r>(req: &'r Request<'_>) -> Option<String> {
    if let Some(header) = req.headers().get_one("Authorization") {
        return header
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string());
    }
    req.cookies()
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = AuthError;

    /// Verify the token, then check it carries the permission for this user
    /// type. Every token failure becomes a 401; a valid token without the
    /// permission is a 403.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let authority = req
            .rocket()
            .state::<TokenAuthority>()
            .expect("token authority is managed by the config fairing");

        let Some(token) = raw_token(req) else {
            warn!("Request carried no access token");
            return Outcome::Error((Status::Unauthorized, AuthError::MissingToken));
        };

        let payload = match authority.verify(&token) {
            Ok(payload) => payload,
            Err(e) => {
                let e = AuthError::from(e);
                warn!("Rejected access token: {e}");
                return Outcome::Error((Status::Unauthorized, e));
            }
        };
        req.local_cache(|| Some(TokenId(payload.id)));

        if !payload.permits(U::PERMISSION) {
            warn!(
                "Token {} lacks the {} permission",
                payload.id,
                U::PERMISSION
            );
            return Outcome::Forward(Status::Forbidden);
        }

        Outcome::Success(Self {
            payload,
            phantom: PhantomData,
        })
    }
}
