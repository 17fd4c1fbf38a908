use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            vote::{VoteRequest, VoteStatus, VoteStatusRequest},
            Acknowledgement,
        },
        db::Voter,
        ledger::VoteLedger,
        token::AuthToken,
    },
};

pub fn routes() -> Vec<Route> {
    routes![vote, vote_status]
}

/// Cast the caller's vote. The voter named in the body must be the caller.
#[post("/api/vote", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken<Voter>,
    request: Json<VoteRequest>,
    ledger: VoteLedger,
) -> Result<Json<Acknowledgement>> {
    ledger
        .cast_vote(token.national_id(), &request.national_id, request.candidate_id)
        .await?;
    Ok(Json(Acknowledgement::default()))
}

#[post("/api/vote/status", data = "<request>", format = "json")]
async fn vote_status(
    _token: AuthToken<Voter>,
    request: Json<VoteStatusRequest>,
    ledger: VoteLedger,
) -> Result<Json<VoteStatus>> {
    let status = ledger.check_vote_status(&request.national_id).await?;
    Ok(Json(VoteStatus { status }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join_all,
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{serde_json::json, Value},
    };

    use crate::model::{
        common::{CandidateId, NationalId},
        db::{CandidateProfile, ELECTION_CLOSED},
        store::{MemoryStore, Store},
    };

    use super::*;

    async fn example_candidate(store: &MemoryStore) -> CandidateId {
        store
            .insert_candidate(CandidateProfile::example())
            .await
            .unwrap()
            .id
    }

    async fn cast<'c>(
        client: &'c Client,
        national_id: &NationalId,
        candidate_id: CandidateId,
    ) -> LocalResponse<'c> {
        client
            .post(uri!(vote))
            .header(ContentType::JSON)
            .body(json!({ "nationalId": national_id, "candidateId": candidate_id }).to_string())
            .dispatch()
            .await
    }

    async fn error_message(response: LocalResponse<'_>) -> String {
        let body: Value = response.into_json().await.unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    async fn tally(store: &MemoryStore, id: CandidateId) -> u64 {
        store.find_candidate(id).await.unwrap().unwrap().vote_count
    }

    #[backend_test(voter)]
    async fn vote_once(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        let voter = Voter::example().national_id;

        let response = cast(&client, &voter, candidate).await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            json!({ "status": "ok" }),
            response.into_json::<Value>().await.unwrap()
        );

        let response = client
            .post(uri!(vote_status))
            .header(ContentType::JSON)
            .body(json!({ "nationalId": voter }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            VoteStatus { status: true },
            response.into_json().await.unwrap()
        );
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[backend_test(voter)]
    async fn vote_twice(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        let voter = Voter::example().national_id;
        cast(&client, &voter, candidate).await;

        let response = cast(&client, &voter, candidate).await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!("already voted", error_message(response).await);
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[backend_test(voter)]
    async fn concurrent_votes_count_once(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        let voter = Voter::example().national_id;

        let attempts = (0..16).map(|_| async {
            cast(&client, &voter, candidate).await.status()
        });
        let statuses = join_all(attempts).await;

        let accepted = statuses.iter().filter(|s| **s == Status::Ok).count();
        let conflicts = statuses.iter().filter(|s| **s == Status::Conflict).count();
        assert_eq!((1, 15), (accepted, conflicts));
        assert_eq!(1, tally(&store, candidate).await);
    }

    #[backend_test(voter)]
    async fn vote_while_closed(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        store
            .set_election_property(ELECTION_CLOSED, true)
            .await
            .unwrap();

        let response = cast(&client, &Voter::example().national_id, candidate).await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!("election closed", error_message(response).await);
        assert_eq!(0, tally(&store, candidate).await);
    }

    #[backend_test(voter)]
    async fn vote_for_someone_else(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        let other = store.with_voter(Voter::example2()).await;

        let response = cast(&client, &other, candidate).await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(
            "cannot vote on behalf of another identity",
            error_message(response).await
        );
        assert!(!store.find_voter(&other).await.unwrap().unwrap().has_voted);
    }

    #[backend_test(voter)]
    async fn vote_for_unknown_candidate(client: Client, store: MemoryStore) {
        let response = cast(&client, &Voter::example().national_id, CandidateId(42)).await;
        assert_eq!(Status::NotFound, response.status());

        let voter = store
            .find_voter(&Voter::example().national_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!voter.has_voted);
    }

    #[backend_test(voter)]
    async fn malformed_vote(client: Client) {
        let response = client
            .post(uri!(vote))
            .header(ContentType::JSON)
            .body(json!({ "nationalId": "123", "candidateId": 1 }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
    }

    #[backend_test]
    async fn vote_unauthenticated(client: Client, store: MemoryStore) {
        let candidate = example_candidate(&store).await;
        let voter = store.with_voter(Voter::example()).await;

        let response = cast(&client, &voter, candidate).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(0, tally(&store, candidate).await);
    }

    #[backend_test(voter)]
    async fn status_of_unknown_voter(client: Client) {
        let response = client
            .post(uri!(vote_status))
            .header(ContentType::JSON)
            .body(json!({ "nationalId": Voter::example2().national_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
