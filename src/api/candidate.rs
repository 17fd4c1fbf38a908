use rocket::{serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            candidate::{CandidateDescription, CandidateSpec, CandidateUpdate},
            pagination::Pagination,
            Acknowledgement,
        },
        common::CandidateId,
        db::{CandidateProfile, Voter},
        store::{DeleteOutcome, StoreHandle},
        token::{Admin, AuthToken},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_candidate,
        get_candidate,
        list_candidates,
        update_candidate,
        delete_candidate
    ]
}

fn candidate_not_found(id: CandidateId) -> Error {
    Error::NotFound(format!("candidate {id} not found"))
}

#[post("/api/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    handle: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let profile = CandidateProfile::try_from(spec.into_inner())?;
    let candidate = handle.store().insert_candidate(profile).await?;
    info!("Created candidate {}", candidate.id);
    Ok(Json(candidate.into()))
}

#[get("/api/candidates/<id>")]
async fn get_candidate(
    _token: AuthToken<Voter>,
    id: CandidateId,
    handle: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let candidate = handle
        .store()
        .find_candidate(id)
        .await?
        .ok_or_else(|| candidate_not_found(id))?;
    Ok(Json(candidate.into()))
}

#[get("/api/candidates")]
async fn list_candidates(
    _token: AuthToken<Voter>,
    pagination: Pagination,
    handle: &State<StoreHandle>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = handle
        .store()
        .list_candidates(pagination.skip(), pagination.page_size())
        .await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[put("/api/candidates", data = "<update>", format = "json")]
async fn update_candidate(
    _token: AuthToken<Admin>,
    update: Json<CandidateUpdate>,
    handle: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let CandidateUpdate { candidate_id, spec } = update.into_inner();
    let profile = CandidateProfile::try_from(spec)?;
    let candidate = handle
        .store()
        .update_candidate(candidate_id, profile)
        .await?
        .ok_or_else(|| candidate_not_found(candidate_id))?;
    info!("Updated candidate {candidate_id}");
    Ok(Json(candidate.into()))
}

#[delete("/api/candidates/<id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    id: CandidateId,
    handle: &State<StoreHandle>,
) -> Result<Json<Acknowledgement>> {
    match handle.store().delete_candidate(id).await? {
        DeleteOutcome::Deleted => {
            info!("Deleted candidate {id}");
            Ok(Json(Acknowledgement::default()))
        }
        DeleteOutcome::NotFound => Err(candidate_not_found(id)),
        DeleteOutcome::HasVotes => Err(Error::Conflict(format!(
            "candidate {id} has votes and cannot be deleted"
        ))),
    }
}
