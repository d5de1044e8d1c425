use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "workerRunning": state.service.worker_running(),
        "droppedEvents": state.service.dropped_count(),
    }))
}
