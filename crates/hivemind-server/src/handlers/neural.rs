use actix_web::{web, HttpResponse};
use hivemind_metrics::{NeuralActivationInput, NeuralQuery};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Activations may be posted one at a time or as an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActivationBody {
    Many(Vec<NeuralActivationInput>),
    One(NeuralActivationInput),
}

impl ActivationBody {
    fn into_vec(self) -> Vec<NeuralActivationInput> {
        match self {
            Self::Many(inputs) => inputs,
            Self::One(input) => vec![input],
        }
    }
}

pub async fn record_activations(
    state: web::Data<AppState>,
    body: web::Json<ActivationBody>,
) -> ApiResult<HttpResponse> {
    let recorded = state
        .service
        .record_neural_activations(body.into_inner().into_vec())
        .await?;
    Ok(HttpResponse::Created().json(json!({ "recorded": recorded.len() })))
}

/// Queue activations for the background worker. Any that do not fit are
/// dropped and the request answers 503.
pub async fn enqueue_activations(
    state: web::Data<AppState>,
    body: web::Json<ActivationBody>,
) -> ApiResult<HttpResponse> {
    let inputs = body.into_inner().into_vec();
    let total = inputs.len();
    let queued = inputs
        .into_iter()
        .map(|input| state.service.enqueue_neural_activation(input))
        .filter(|accepted| *accepted)
        .count();

    if queued == total {
        Ok(HttpResponse::Accepted().json(json!({ "queued": queued })))
    } else {
        Err(ApiError::QueueFull)
    }
}

pub async fn network_state(
    state: web::Data<AppState>,
    query: web::Query<NeuralQuery>,
) -> ApiResult<HttpResponse> {
    let network = state.service.neural_network_state(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(network))
}
