use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use hivemind_metrics::ObserveError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Observe(#[from] ObserveError),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    BodyTooLarge(String),

    #[error("Ingestion queue is full")]
    QueueFull,
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Observe(ObserveError::InvalidEventKind { .. }) => "invalid_event_kind",
            ApiError::Observe(ObserveError::InvalidFilter(_)) => "invalid_filter",
            ApiError::Observe(ObserveError::InvalidInput(_)) | ApiError::BadRequest(_) => {
                "invalid_request_error"
            }
            ApiError::Observe(ObserveError::PayloadTooLarge { .. }) | ApiError::BodyTooLarge(_) => {
                "payload_too_large"
            }
            ApiError::Observe(ObserveError::StoreUnavailable(_)) | ApiError::QueueFull => {
                "service_unavailable"
            }
            ApiError::Observe(_) => "store_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Observe(error) if error.is_validation() => match error {
                ObserveError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            },
            ApiError::Observe(ObserveError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Observe(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        HttpResponse::build(status_code).json(JsonErrorWrapper {
            error: JsonError {
                message: self.to_string(),
                r#type: self.kind().to_string(),
            },
        })
    }
}

/// Route malformed JSON bodies through the same error envelope.
pub fn json_error_handler(error: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    match error {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            ApiError::BodyTooLarge(error.to_string()).into()
        }
        other => ApiError::BadRequest(other.to_string()).into(),
    }
}

pub fn query_error_handler(error: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Observe(ObserveError::InvalidFilter(error.to_string())).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_client_statuses() {
        let kind = ApiError::from(ObserveError::invalid_kind("eventType", "Bogus"));
        assert_eq!(kind.status_code(), StatusCode::BAD_REQUEST);

        let filter = ApiError::from(ObserveError::InvalidFilter("limit".into()));
        assert_eq!(filter.status_code(), StatusCode::BAD_REQUEST);

        let size = ApiError::from(ObserveError::PayloadTooLarge { size: 9, max: 1 });
        assert_eq!(size.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn store_failures_map_to_server_statuses() {
        let down = ApiError::from(ObserveError::StoreUnavailable("locked".into()));
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let task = ApiError::from(ObserveError::Task("join".into()));
        assert_eq!(task.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(task.kind(), "store_error");
    }
}
