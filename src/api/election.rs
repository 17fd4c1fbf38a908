use rocket::{
    futures::StreamExt,
    http::{ContentType, Header},
    response::{self, stream::TextStream, Responder},
    serde::json::Json,
    Request, Response, Route, State,
};

use crate::{
    error::Result,
    model::{
        api::election::{ElectionState, ResultDescription, ToggleRequest, ToggleResponse},
        db::Voter,
        gate::ElectionGate,
        results::ResultAggregator,
        store::StoreHandle,
        token::{Admin, AuthToken},
    },
};

pub const EXPORT_HEADER: &str = "Candidate id,National id";
const EXPORT_FILE_NAME: &str = "export.csv";

pub fn routes() -> Vec<Route> {
    routes![election_state, toggle, result, export]
}

#[get("/api/election")]
async fn election_state(
    _token: AuthToken<Voter>,
    gate: ElectionGate,
) -> Result<Json<ElectionState>> {
    let closed = gate.is_closed().await?;
    Ok(Json(ElectionState { closed }))
}

/// Open or close the election.
#[post("/api/election/toggle", data = "<request>", format = "json")]
async fn toggle(
    _token: AuthToken<Admin>,
    request: Json<ToggleRequest>,
    gate: ElectionGate,
) -> Result<Json<ToggleResponse>> {
    let change = gate.set_closed(!request.enable).await?;
    Ok(Json(change.into()))
}

/// Candidates ranked by votes, with their share of the total.
#[get("/api/election/result")]
async fn result(
    _token: AuthToken<Voter>,
    aggregator: ResultAggregator,
) -> Result<Json<Vec<ResultDescription>>> {
    let results = aggregator.compute_results().await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

/// Serve the wrapped responder as a CSV file download.
pub struct CsvExport<R>(pub R);

impl<'r, 'o: 'r, R: Responder<'r, 'o>> Responder<'r, 'o> for CsvExport<R> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        Response::build_from(self.0.respond_to(req)?)
            .header(ContentType::CSV)
            .header(Header::new(
                "Content-Disposition",
                format!("attachment; filename={EXPORT_FILE_NAME}"),
            ))
            .ok()
    }
}

/// Every ballot as `candidate,voter`, ordered by candidate then time cast.
/// Streamed straight from the store.
#[get("/api/election/export")]
async fn export(
    _token: AuthToken<Admin>,
    handle: &State<StoreHandle>,
) -> Result<CsvExport<TextStream![String]>> {
    let mut records = handle.store().ballot_records().await?;
    Ok(CsvExport(TextStream! {
        yield format!("{EXPORT_HEADER}\n");
        while let Some(record) = records.next().await {
            match record {
                Ok(record) => yield format!("{},{}\n", record.candidate_id, record.national_id),
                Err(e) => {
                    error!("Ballot export cut short: {e}");
                    break;
                }
            }
        }
    }))
}
