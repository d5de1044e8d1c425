use actix_web::{web, HttpResponse};
use hivemind_metrics::{EventInput, EventQuery};
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn record(
    state: web::Data<AppState>,
    body: web::Json<EventInput>,
) -> ApiResult<HttpResponse> {
    let id = state.service.record_event(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

pub async fn record_batch(
    state: web::Data<AppState>,
    body: web::Json<Vec<EventInput>>,
) -> ApiResult<HttpResponse> {
    let ids = state.service.record_events_batch(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "ids": ids })))
}

pub async fn enqueue(
    state: web::Data<AppState>,
    body: web::Json<EventInput>,
) -> ApiResult<HttpResponse> {
    if state.service.enqueue_event(body.into_inner()) {
        Ok(HttpResponse::Accepted().json(json!({ "queued": true })))
    } else {
        Err(ApiError::QueueFull)
    }
}

pub async fn query(
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> ApiResult<HttpResponse> {
    let events = state.service.query_events(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(events))
}
