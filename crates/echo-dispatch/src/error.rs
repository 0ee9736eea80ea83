use thiserror::Error;

use echo_store::StoreError;

/// Errors from the email provider call.
#[derive(Debug, Error)]
pub enum MailerError {
    /// Transport-level failure (connect, TLS, timeout).
    #[error("Email provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("Email provider HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

/// Errors from signed media URL generation. Always non-fatal for the
/// pipeline — the email degrades to a placeholder notice.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media signing is not configured")]
    Unconfigured,

    #[error("media signing failed: {0}")]
    Signing(String),
}

/// A failure while processing one delivery. Caught at the per-item
/// boundary; never propagates to sibling items.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mailer(#[from] MailerError),

    /// The provider accepted the email but the update to `sent` failed.
    /// The delivery is recorded `failed` with this distinct text so an
    /// operator can tell it apart from a transport failure before
    /// resetting it (a blind reset would send a duplicate).
    #[error("email sent but status update failed: {0}")]
    SentUnrecorded(StoreError),
}

/// A whole-run failure: nothing (more) is processed.
#[derive(Debug, Error)]
pub enum RunError {
    /// The initial pending-batch fetch failed.
    #[error("fetch-pending failed: {0}")]
    FetchPending(String),

    /// The run exceeded its wall-clock deadline. Already-claimed rows
    /// are recovered by the stale-processing release of a later run.
    #[error("run deadline of {secs}s exceeded")]
    Deadline { secs: u64 },
}
