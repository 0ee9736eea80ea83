//! Worker ingress — POST /worker/check-deliveries.
//!
//! One endpoint drives the whole pipeline: authenticate, confirm the
//! dispatcher is configured, run a batch, and report. Every failure mode has
//! its own response shape so callers (and cron monitors) can tell an auth
//! problem from a half-configured deployment from a mid-run fault.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use echo_dispatch::{RunError, RunReport};

use crate::app::AppState;
use crate::auth;

// ── Response bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UnauthorizedBody {
    pub ok: bool,
    pub error: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MissingEnvBody {
    pub ok: bool,
    pub error: &'static str,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct StepErrorBody {
    pub ok: bool,
    pub step: &'static str,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct FatalBody {
    pub ok: bool,
    pub fatal: String,
}

impl FatalBody {
    pub fn new(fatal: String) -> Self {
        Self { ok: false, fatal }
    }
}

/// Every way a worker run can fail to produce a report.
#[derive(Debug)]
pub enum WorkerFailure {
    /// Bad or absent bearer token — nothing was touched.
    Unauthorized,
    /// Required settings are absent; lists their env names.
    MissingEnv(Vec<&'static str>),
    /// A named pipeline step failed before any per-item work.
    Step {
        step: &'static str,
        error: String,
    },
    /// The run itself died (deadline, panic).
    Fatal(String),
}

impl IntoResponse for WorkerFailure {
    fn into_response(self) -> Response {
        match self {
            WorkerFailure::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(UnauthorizedBody {
                    ok: false,
                    error: "Unauthorized",
                }),
            )
                .into_response(),
            WorkerFailure::MissingEnv(missing) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MissingEnvBody {
                    ok: false,
                    error: "Missing env",
                    missing,
                }),
            )
                .into_response(),
            WorkerFailure::Step { step, error } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StepErrorBody {
                    ok: false,
                    step,
                    error,
                }),
            )
                .into_response(),
            WorkerFailure::Fatal(fatal) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FatalBody { ok: false, fatal }),
            )
                .into_response(),
        }
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// POST /worker/check-deliveries
///
/// Auth is checked before anything else; an unauthorized caller learns
/// nothing about the deployment's configuration state.
pub async fn check_deliveries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunReport>, WorkerFailure> {
    if let Err(reason) = auth::verify_bearer(&headers, state.config.worker.secret.as_deref()) {
        warn!(%reason, "worker request rejected");
        return Err(WorkerFailure::Unauthorized);
    }

    let missing = state.config.missing_required();
    let dispatcher = match &state.dispatcher {
        Some(d) if missing.is_empty() => d,
        _ => {
            warn!(?missing, "worker invoked without required settings");
            return Err(WorkerFailure::MissingEnv(missing));
        }
    };

    match dispatcher.run().await {
        Ok(report) => {
            info!(
                picked = report.picked,
                sent = report.sent,
                failed = report.failed,
                skipped = report.skipped,
                "worker run complete"
            );
            Ok(Json(report))
        }
        Err(RunError::FetchPending(error)) => {
            warn!(%error, "worker run aborted at fetch-pending");
            Err(WorkerFailure::Step {
                step: "fetch-pending",
                error,
            })
        }
        Err(e @ RunError::Deadline { .. }) => {
            warn!(error = %e, "worker run hit its deadline");
            Err(WorkerFailure::Fatal(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use echo_core::config::{EchoConfig, MediaConfig};
    use echo_dispatch::{Dispatcher, HmacMediaResolver, Mailer, MailerError};
    use echo_store::{db::init_db, DeliveryStatus, DeliveryStore, NewMessage};
    use std::sync::Mutex;

    struct RecordingMailer {
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, to: &str, _: &str, _: &str) -> Result<(), MailerError> {
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    fn open_store() -> Arc<DeliveryStore> {
        let db = rusqlite::Connection::open_in_memory().unwrap();
        init_db(&db).unwrap();
        Arc::new(DeliveryStore::new(db))
    }

    fn configured(secret: Option<&str>, key: Option<&str>) -> EchoConfig {
        let mut config = EchoConfig::default();
        config.worker.secret = secret.map(str::to_string);
        config.mailer.key = key.map(str::to_string);
        config
    }

    /// State with a dispatcher wired to the recording mailer, mirroring how
    /// main() only builds one when nothing required is missing.
    fn state_with_mailer(
        config: EchoConfig,
        store: Arc<DeliveryStore>,
        sent: Arc<Mutex<Vec<String>>>,
    ) -> Arc<AppState> {
        let dispatcher = if config.missing_required().is_empty() {
            Some(Arc::new(Dispatcher::new(
                Arc::clone(&store),
                Box::new(RecordingMailer { sent }),
                Box::new(HmacMediaResolver::from_config(&MediaConfig::default())),
                &config.worker,
            )))
        } else {
            None
        };
        Arc::new(AppState {
            config,
            store,
            dispatcher,
        })
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn seed_due_delivery(store: &DeliveryStore) -> String {
        let message = store
            .insert_message(NewMessage {
                user_id: "user-1".into(),
                title: "Goodbye".into(),
                body_text: Some("So long.".into()),
                deliver_at: Some("2020-01-01T00:00:00+00:00".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let recipient = store
            .insert_recipient("ada@example.com", Some("Ada"))
            .await
            .unwrap();
        let delivery = store
            .insert_delivery("user-1", &message.id, &recipient.id)
            .await
            .unwrap();
        delivery.id
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized_and_leaves_rows_alone() {
        let store = open_store();
        let id = seed_due_delivery(&store).await;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let state = state_with_mailer(
            configured(Some("s3cret"), Some("rk_test")),
            Arc::clone(&store),
            Arc::clone(&sent),
        );

        let result = check_deliveries(State(state), bearer("wrong")).await;
        assert!(matches!(result, Err(WorkerFailure::Unauthorized)));

        // The due delivery was never claimed, let alone sent.
        assert!(sent.lock().unwrap().is_empty());
        let row = store.delivery(&id).await.unwrap();
        assert_eq!(row.status, DeliveryStatus::Pending);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let state = state_with_mailer(
            configured(Some("s3cret"), Some("rk_test")),
            open_store(),
            Arc::new(Mutex::new(Vec::new())),
        );
        let result = check_deliveries(State(state), HeaderMap::new()).await;
        assert!(matches!(result, Err(WorkerFailure::Unauthorized)));
    }

    #[tokio::test]
    async fn missing_mailer_key_is_reported_by_name() {
        let state = state_with_mailer(
            configured(Some("s3cret"), None),
            open_store(),
            Arc::new(Mutex::new(Vec::new())),
        );
        let result = check_deliveries(State(state), bearer("s3cret")).await;
        match result {
            Err(WorkerFailure::MissingEnv(missing)) => {
                assert_eq!(missing, vec!["ECHO_MAILER_KEY"]);
            }
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_is_checked_before_configuration() {
        // A caller with a bad token must not learn what is missing.
        let state = state_with_mailer(
            configured(Some("s3cret"), None),
            open_store(),
            Arc::new(Mutex::new(Vec::new())),
        );
        let result = check_deliveries(State(state), bearer("wrong")).await;
        assert!(matches!(result, Err(WorkerFailure::Unauthorized)));
    }

    #[tokio::test]
    async fn successful_run_returns_the_report() {
        let store = open_store();
        let id = seed_due_delivery(&store).await;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let state = state_with_mailer(
            configured(Some("s3cret"), Some("rk_test")),
            Arc::clone(&store),
            Arc::clone(&sent),
        );

        let Json(report) = check_deliveries(State(state), bearer("s3cret"))
            .await
            .expect("run should succeed");

        assert!(report.ok);
        assert_eq!((report.picked, report.sent), (1, 1));
        assert!(report.errors.is_empty());
        assert_eq!(*sent.lock().unwrap(), vec!["ada@example.com".to_string()]);
        let row = store.delivery(&id).await.unwrap();
        assert_eq!(row.status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn broken_storage_reports_the_fetch_step() {
        // No schema at all: the first batch fetch fails, the run aborts.
        let store = Arc::new(DeliveryStore::new(
            rusqlite::Connection::open_in_memory().unwrap(),
        ));
        let state = state_with_mailer(
            configured(Some("s3cret"), Some("rk_test")),
            store,
            Arc::new(Mutex::new(Vec::new())),
        );
        let result = check_deliveries(State(state), bearer("s3cret")).await;
        match result {
            Err(WorkerFailure::Step { step, error }) => {
                assert_eq!(step, "fetch-pending");
                assert!(!error.is_empty());
            }
            other => panic!("expected Step failure, got {other:?}"),
        }
    }

    #[test]
    fn failure_bodies_serialise_to_the_documented_shapes() {
        let unauthorized = serde_json::to_value(UnauthorizedBody {
            ok: false,
            error: "Unauthorized",
        })
        .unwrap();
        assert_eq!(
            unauthorized,
            serde_json::json!({"ok": false, "error": "Unauthorized"})
        );

        let missing = serde_json::to_value(MissingEnvBody {
            ok: false,
            error: "Missing env",
            missing: vec!["ECHO_MAILER_KEY"],
        })
        .unwrap();
        assert_eq!(
            missing,
            serde_json::json!({"ok": false, "error": "Missing env", "missing": ["ECHO_MAILER_KEY"]})
        );

        let step = serde_json::to_value(StepErrorBody {
            ok: false,
            step: "fetch-pending",
            error: "no such table".into(),
        })
        .unwrap();
        assert_eq!(
            step,
            serde_json::json!({"ok": false, "step": "fetch-pending", "error": "no such table"})
        );

        let fatal = serde_json::to_value(FatalBody::new("run deadline of 60s exceeded".into()))
            .unwrap();
        assert_eq!(
            fatal,
            serde_json::json!({"ok": false, "fatal": "run deadline of 60s exceeded"})
        );
    }
}
