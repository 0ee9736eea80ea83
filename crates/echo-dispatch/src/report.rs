use chrono::{DateTime, Utc};
use serde::Serialize;

/// One per-item failure, isolated from its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    /// Delivery ID.
    pub id: String,
    pub error: String,
}

/// Aggregate result of one worker run. Serialised verbatim as the
/// endpoint's success body.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub ok: bool,
    /// Wall-clock start of the run, ISO-8601.
    pub now: String,
    /// Deliveries successfully claimed (`pending → processing`).
    pub picked: u32,
    pub sent: u32,
    pub failed: u32,
    /// Not due yet, or lost the claim race — still `pending`.
    pub skipped: u32,
    pub errors: Vec<ItemError>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            now: started_at.to_rfc3339(),
            picked: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }
}
