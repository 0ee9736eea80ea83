use serde::{Deserialize, Serialize};

/// Lifecycle state of a delivery.
///
/// `pending → processing → {sent | failed}`. A `failed` delivery is
/// terminal for the worker; only an external reset returns it to
/// `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting to be evaluated on a future worker run.
    Pending,
    /// Claimed by a worker run; dispatch in flight.
    Processing,
    /// Email accepted by the provider and recorded.
    Sent,
    /// Dispatch failed; see `last_error`.
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "processing" => Ok(DeliveryStatus::Processing),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

/// One (message, recipient) dispatch unit with its own lifecycle.
///
/// Created by the compose/schedule flow; mutated only by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    /// UUID string — primary key.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    pub message_id: String,
    pub recipient_id: String,
    pub status: DeliveryStatus,
    /// Why the last attempt failed, capped at 1000 bytes.
    pub last_error: Option<String>,
    /// ISO-8601. Batch ordering key (oldest-stalest first).
    pub updated_at: String,
}

/// The content to deliver. Read-only from the worker's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body_text: Option<String>,
    /// Storage key of an optional attachment.
    pub media_key: Option<String>,
    /// ISO-8601 fixed delivery time, if scheduled.
    pub deliver_at: Option<String>,
    /// When true, the inactivity trigger also applies.
    pub lifecheck_enabled: bool,
}

/// Parameters for creating a message (compose flow and tests).
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub user_id: String,
    pub title: String,
    pub body_text: Option<String>,
    pub media_key: Option<String>,
    pub deliver_at: Option<String>,
    pub lifecheck_enabled: bool,
}

/// Delivery target. Read-only from the worker's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Per-user dead-man's-switch configuration. Mutated by the check-in
/// flow; the worker only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecheckSettings {
    pub user_id: String,
    /// ISO-8601 timestamp of the last user check-in, if any.
    pub last_ping_at: Option<String>,
    /// Allowed inactivity in minutes; `None` means the default policy
    /// value (4320) applies.
    pub grace_minutes: Option<i64>,
}
