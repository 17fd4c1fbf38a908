use rocket::{
    http::Status,
    response::content::RawJson,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};

use crate::{error::error_body, logging::RequestId};

pub mod auth;
mod candidate;
mod election;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(candidate::routes());
    routes.extend(voting::routes());
    routes.extend(election::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable,
        fallback
    ]
}

#[catch(400)]
fn bad_request() -> RawJson<String> {
    RawJson(error_body("bad request"))
}

/// Every authentication failure looks the same from outside.
#[catch(401)]
fn unauthorized() -> RawJson<String> {
    RawJson(error_body("unauthorized"))
}

#[catch(403)]
fn forbidden() -> RawJson<String> {
    RawJson(error_body("forbidden"))
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> RawJson<String> {
    RawJson(error_body(&format!("no route for {}", req.uri().path())))
}

#[catch(422)]
fn unprocessable() -> RawJson<String> {
    RawJson(error_body("malformed request body"))
}

#[catch(default)]
fn fallback(status: Status, req: &Request<'_>) -> (Status, Json<Value>) {
    let message = if status.code >= 500 {
        error!("req{} failed with {status}", RequestId::of(req));
        "internal server error"
    } else {
        status.reason().unwrap_or("error")
    };
    (status, Json(json!({ "status": "error", "error": message })))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    #[backend_test]
    async fn unknown_route(client: Client) {
        let response = client.get("/nothing/here").dispatch().await;

        assert_eq!(Status::NotFound, response.status());
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!("error", body["status"]);
    }
}
