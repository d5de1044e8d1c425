use actix_web::{web, HttpResponse};
use hivemind_metrics::ScopeQuery;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn options(
    state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> ApiResult<HttpResponse> {
    let options = state.service.filter_options(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(options))
}
