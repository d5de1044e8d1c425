use std::io;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use hivemind_metrics::ObserveConfig;

use crate::error::{json_error_handler, query_error_handler};
use crate::handlers;
use crate::state::AppState;

/// Upper bound on a request body; per-event payload limits are enforced by the service.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Register the `/api/v1` routes and extractor configs.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_BODY_BYTES)
            .error_handler(json_error_handler),
    )
    .app_data(web::QueryConfig::default().error_handler(query_error_handler))
    .service(
        web::scope("/api/v1")
            .route("/events", web::post().to(handlers::events::record))
            .route("/events", web::get().to(handlers::events::query))
            .route("/events/batch", web::post().to(handlers::events::record_batch))
            .route("/events/enqueue", web::post().to(handlers::events::enqueue))
            .route("/sessions/active", web::get().to(handlers::sessions::active))
            .route(
                "/sessions/{session_id}/summary",
                web::get().to(handlers::sessions::summary),
            )
            .route("/filters", web::get().to(handlers::filters::options))
            .route("/metrics/costs", web::get().to(handlers::metrics::costs))
            .route("/metrics/squadrons", web::get().to(handlers::metrics::squadrons))
            .route(
                "/squadrons/status",
                web::post().to(handlers::squadrons::record_status),
            )
            .route(
                "/squadrons/status/enqueue",
                web::post().to(handlers::squadrons::enqueue_status),
            )
            .route(
                "/neural/activations",
                web::post().to(handlers::neural::record_activations),
            )
            .route(
                "/neural/activations/enqueue",
                web::post().to(handlers::neural::enqueue_activations),
            )
            .route("/neural/state", web::get().to(handlers::neural::network_state))
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run_server(port: u16, config: ObserveConfig) -> io::Result<()> {
    log::info!("Opening observability store at {}", config.db_path.display());
    let state = AppState::new(config)
        .await
        .map_err(|error| io::Error::new(io::ErrorKind::Other, error.to_string()))?;
    let state = web::Data::new(state);
    let app_state = state.clone();

    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(configure)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await;

    state.service.shutdown();
    result
}
