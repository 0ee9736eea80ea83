//! The batch orchestrator — one worker run over pending deliveries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use echo_core::config::WorkerConfig;
use echo_store::{Delivery, DeliveryStore};

use crate::compose;
use crate::error::{DispatchError, RunError};
use crate::mailer::Mailer;
use crate::media::MediaResolver;
use crate::report::{ItemError, RunReport};
use crate::trigger;

/// Drives every worker run. Built once at process start and shared by
/// reference; all collaborators are injected, so concurrent
/// invocations coordinate only through the store's conditional claim.
pub struct Dispatcher {
    store: Arc<DeliveryStore>,
    mailer: Box<dyn Mailer>,
    media: Box<dyn MediaResolver>,
    batch: u32,
    stale_minutes: i64,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<DeliveryStore>,
        mailer: Box<dyn Mailer>,
        media: Box<dyn MediaResolver>,
        cfg: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            media,
            batch: cfg.batch,
            stale_minutes: cfg.stale,
            deadline: Duration::from_secs(cfg.deadline),
        }
    }

    /// One run-to-completion pass, capped at the configured deadline.
    ///
    /// Exceeding the deadline is a fatal, reported outcome; rows already
    /// claimed but not finished are recovered by the stale-processing
    /// release of a later run.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let secs = self.deadline.as_secs();
        match tokio::time::timeout(self.deadline, self.run_inner()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(secs, "worker run exceeded its deadline");
                Err(RunError::Deadline { secs })
            }
        }
    }

    async fn run_inner(&self) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(Utc::now());

        // Recovery pass: rows orphaned in `processing` by a crashed run
        // become pickable again. Best-effort, never aborts the run.
        if let Err(e) = self.store.release_stale(self.stale_minutes).await {
            warn!(error = %e, "stale-processing release failed");
        }

        let pending = self
            .store
            .fetch_pending(self.batch)
            .await
            .map_err(|e| RunError::FetchPending(e.to_string()))?;
        debug!(count = pending.len(), "pending deliveries fetched");

        for delivery in &pending {
            // Per-item isolation boundary: a failure here marks this
            // delivery failed and the loop moves on.
            if let Err(e) = self.process(delivery, &mut report).await {
                report.failed += 1;
                report.errors.push(ItemError {
                    id: delivery.id.clone(),
                    error: e.to_string(),
                });
                if let Err(update_err) = self.store.mark_failed(&delivery.id, &e.to_string()).await
                {
                    warn!(
                        delivery_id = %delivery.id,
                        error = %update_err,
                        "failed-status update did not stick"
                    );
                }
            }
        }
        Ok(report)
    }

    async fn process(
        &self,
        delivery: &Delivery,
        report: &mut RunReport,
    ) -> Result<(), DispatchError> {
        let (msg, recipient) = tokio::join!(
            self.store.message(&delivery.message_id),
            self.store.recipient(&delivery.recipient_id),
        );
        let msg = msg?;
        let recipient = recipient?;

        let lifecheck = if msg.lifecheck_enabled {
            self.store.lifecheck(&delivery.user_id).await?
        } else {
            None
        };

        let due = trigger::evaluate(&msg, lifecheck.as_ref(), Utc::now());
        if !due.any() {
            debug!(delivery_id = %delivery.id, "not due — skipped");
            report.skipped += 1;
            return Ok(());
        }

        if !self.store.claim(&delivery.id).await? {
            // Another invocation claimed it first, or its status changed
            // since the snapshot read.
            debug!(delivery_id = %delivery.id, "claim lost — skipped");
            report.skipped += 1;
            return Ok(());
        }
        report.picked += 1;

        let media_line = match msg.media_key.as_deref() {
            Some(key) => match self.media.signed_url(key) {
                Ok(url) => compose::attachment_line(&url),
                Err(e) => {
                    warn!(delivery_id = %delivery.id, error = %e, "attachment link unavailable");
                    compose::attachment_unavailable(&e.to_string())
                }
            },
            None => String::new(),
        };

        let subject = compose::subject(&msg);
        let text = compose::body(&msg, &media_line);
        self.mailer
            .send(&recipient.email, &subject, &text)
            .await?;

        self.store
            .mark_sent(&delivery.id)
            .await
            .map_err(DispatchError::SentUnrecorded)?;
        report.sent += 1;
        info!(
            delivery_id = %delivery.id,
            mailer = self.mailer.name(),
            by_time = due.by_time,
            by_lifecheck = due.by_lifecheck,
            "delivery sent"
        );
        Ok(())
    }
}
