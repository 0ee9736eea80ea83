use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::error;

use echo_core::config::EchoConfig;
use echo_dispatch::Dispatcher;
use echo_store::DeliveryStore;

use crate::http::worker::FatalBody;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: EchoConfig,
    pub store: Arc<DeliveryStore>,
    /// None while required settings are absent; the worker endpoint then
    /// reports which ones are missing instead of running.
    pub dispatcher: Option<Arc<Dispatcher>>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/worker/check-deliveries",
            post(crate::http::worker::check_deliveries),
        )
        .route("/worker/diag", get(crate::http::diag::diag_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::catch_panic::CatchPanicLayer::custom(handle_panic))
}

/// A panicking handler must still produce the fatal-error JSON shape rather
/// than an empty 500.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FatalBody::new(detail)),
    )
        .into_response()
}
