use actix_web::{web, HttpResponse};
use hivemind_metrics::ScopeQuery;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn active(
    state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> ApiResult<HttpResponse> {
    let sessions = state.service.list_active_sessions(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn summary(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let session_id = path.into_inner();
    let summary = state.service.session_summary(&session_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}
