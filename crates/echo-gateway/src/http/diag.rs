//! Deployment diagnostics — GET /worker/diag.
//!
//! Reports which required settings are present (as booleans, never values)
//! and whether the database answers a trivial query. Intended for a human
//! debugging a misbehaving cron, so it sits behind no auth and leaks nothing
//! secret.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct DiagEnv {
    #[serde(rename = "ECHO_WORKER_SECRET")]
    pub worker_secret: bool,
    #[serde(rename = "ECHO_MAILER_KEY")]
    pub mailer_key: bool,
    #[serde(rename = "ECHO_MEDIA_SECRET")]
    pub media_secret: bool,
    #[serde(rename = "ECHO_MEDIA_URL")]
    pub media_url: bool,
}

#[derive(Debug, Serialize)]
pub struct DiagBody {
    pub ok: bool,
    pub env: DiagEnv,
    pub db: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn present(value: Option<&str>) -> bool {
    value.map(str::trim).is_some_and(|s| !s.is_empty())
}

/// GET /worker/diag
pub async fn diag_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<DiagBody>) {
    let cfg = &state.config;
    let env = DiagEnv {
        worker_secret: present(cfg.worker.secret.as_deref()),
        mailer_key: present(cfg.mailer.key.as_deref()),
        media_secret: present(cfg.media.secret.as_deref()),
        media_url: present(cfg.media.url.as_deref()),
    };

    match state.store.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(DiagBody {
                ok: true,
                env,
                db: "ok",
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(DiagBody {
                ok: false,
                env,
                db: "error",
                error: Some(e.to_string()),
            }),
        ),
    }
}
