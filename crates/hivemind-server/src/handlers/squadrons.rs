use actix_web::{web, HttpResponse};
use hivemind_metrics::SquadronStatusInput;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn record_status(
    state: web::Data<AppState>,
    body: web::Json<SquadronStatusInput>,
) -> ApiResult<HttpResponse> {
    let snapshot = state.service.record_squadron_status(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(snapshot))
}

/// Queue a snapshot for the background worker. 503 when the bus is full.
pub async fn enqueue_status(
    state: web::Data<AppState>,
    body: web::Json<SquadronStatusInput>,
) -> ApiResult<HttpResponse> {
    if state.service.enqueue_squadron_status(body.into_inner()) {
        Ok(HttpResponse::Accepted().json(json!({ "queued": true })))
    } else {
        Err(ApiError::QueueFull)
    }
}
