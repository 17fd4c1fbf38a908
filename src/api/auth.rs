use rocket::{http::CookieJar, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{AuthError, Error, Result},
    model::{
        api::auth::{LoginRequest, LoginResponse, VoterDescription, VoterRegistration},
        common::NationalId,
        db::Voter,
        store::StoreHandle,
        token::{access_token_cookie, TokenAuthority},
    },
};

pub fn routes() -> Vec<Route> {
    routes![register, login]
}

#[post("/users", data = "<registration>", format = "json")]
pub async fn register(
    registration: Json<VoterRegistration>,
    handle: &State<StoreHandle>,
) -> Result<Json<VoterDescription>> {
    let voter = Voter::try_from(registration.into_inner())?;
    let voter = handle.store().insert_voter(voter).await?;
    info!("Registered a new voter");
    Ok(Json(voter.into()))
}

#[post("/users/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    handle: &State<StoreHandle>,
    authority: &State<TokenAuthority>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let LoginRequest {
        national_id,
        password,
    } = credentials.into_inner();
    let national_id: NationalId = national_id
        .parse()
        .map_err(|e| Error::BadRequest(format!("{e}")))?;

    // Unknown voters and wrong passwords are indistinguishable.
    let voter = handle
        .store()
        .find_voter(&national_id)
        .await?
        .filter(|voter| voter.verify_password(&password))
        .ok_or(AuthError::BadCredentials)?;

    let (access_token, payload) = authority.issue(
        voter.national_id.clone(),
        voter.permissions.clone(),
        config.access_token_ttl(),
    );
    info!("Issued access token {}", payload.id);
    cookies.add(access_token_cookie(access_token.clone(), payload.expired_at));

    Ok(Json(LoginResponse {
        access_token,
        expired_at: payload.expired_at,
        user: voter.into(),
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::model::{
        common::Permission,
        db::voter::examples::EXAMPLE_PASSWORD,
        store::{MemoryStore, Store},
        token::ACCESS_TOKEN_COOKIE,
    };

    use super::*;

    #[backend_test]
    async fn register_voter(client: Client, store: MemoryStore) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(VoterRegistration::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let description: VoterDescription = response.into_json().await.unwrap();
        assert_eq!("1234567890123", description.national_id.as_str());
        assert_eq!(vec![Permission::Vote], description.permissions);
        assert!(!description.has_voted);

        let voter = store
            .find_voter(&description.national_id)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.verify_password(&VoterRegistration::example().password));
    }

    #[backend_test]
    async fn register_twice(client: Client) {
        for expected in [Status::Ok, Status::Conflict] {
            let response = client
                .post(uri!(register))
                .header(ContentType::JSON)
                .body(json!(VoterRegistration::example()).to_string())
                .dispatch()
                .await;
            assert_eq!(expected, response.status());
        }
    }

    #[backend_test]
    async fn register_invalid(client: Client, store: MemoryStore) {
        let mut registration = VoterRegistration::example();
        registration.password = "12345".to_string();

        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(json!(registration).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
        assert!(store
            .find_voter(&registration.national_id.parse().unwrap())
            .await
            .unwrap()
            .is_none());
    }

    #[backend_test]
    async fn login_valid(client: Client, store: MemoryStore) {
        store.with_voter(Voter::example()).await;

        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(LoginRequest::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let (cookie_value, http_only) = response
            .cookies()
            .get(ACCESS_TOKEN_COOKIE)
            .map(|cookie| (cookie.value().to_string(), cookie.http_only()))
            .unwrap();
        let body: LoginResponse = response.into_json().await.unwrap();
        assert_eq!(Voter::example().national_id, body.user.national_id);
        assert_eq!(body.access_token, cookie_value);
        assert_eq!(Some(true), http_only);

        let authority = client.rocket().state::<TokenAuthority>().unwrap();
        let payload = authority.verify(&body.access_token).unwrap();
        assert_eq!(Voter::example().national_id, payload.national_id);
        assert_eq!(body.expired_at, payload.expired_at);
        assert!(!payload.permits(Permission::Admin));
    }

    #[backend_test]
    async fn login_invalid(client: Client, store: MemoryStore) {
        store.with_voter(Voter::example()).await;

        // Wrong password and unknown voter both look like bad credentials.
        for credentials in [
            json!({
                "national_id": Voter::example().national_id,
                "password": "not the password",
            }),
            json!({
                "national_id": Voter::example2().national_id,
                "password": EXAMPLE_PASSWORD,
            }),
        ] {
            let response = client
                .post(uri!(login))
                .header(ContentType::JSON)
                .body(credentials.to_string())
                .dispatch()
                .await;

            assert_eq!(Status::Unauthorized, response.status());
            assert!(response.cookies().get(ACCESS_TOKEN_COOKIE).is_none());
            assert_eq!(
                json!({ "status": "error", "error": "unauthorized" }),
                response
                    .into_json::<rocket::serde::json::Value>()
                    .await
                    .unwrap()
            );
        }
    }

    #[backend_test]
    async fn login_malformed_id(client: Client) {
        let response = client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!({ "national_id": "12ab", "password": EXAMPLE_PASSWORD }).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
    }
}
