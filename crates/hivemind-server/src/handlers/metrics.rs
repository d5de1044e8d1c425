use actix_web::{web, HttpResponse};
use hivemind_metrics::{CostQuery, SquadronQuery};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn costs(
    state: web::Data<AppState>,
    query: web::Query<CostQuery>,
) -> ApiResult<HttpResponse> {
    let metrics = state.service.cost_metrics(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(metrics))
}

pub async fn squadrons(
    state: web::Data<AppState>,
    query: web::Query<SquadronQuery>,
) -> ApiResult<HttpResponse> {
    let metrics = state.service.squadron_metrics(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(metrics))
}
