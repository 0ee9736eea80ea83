//! Due-ness evaluation — the two independent delivery triggers.

use chrono::{DateTime, Utc};
use tracing::warn;

use echo_core::config::DEFAULT_GRACE_MINUTES;
use echo_store::{LifecheckSettings, Message};

/// Which triggers fired for a message. Non-exclusive; either one is
/// sufficient for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Due {
    /// `deliver_at` is set, valid, and has passed.
    pub by_time: bool,
    /// Lifecheck is enabled and the user has been inactive past the
    /// grace period (or never checked in at all).
    pub by_lifecheck: bool,
}

impl Due {
    pub fn any(&self) -> bool {
        self.by_time || self.by_lifecheck
    }
}

/// Evaluate both triggers for `msg` at instant `now`.
///
/// `lifecheck` is the owner's settings row when one exists; it is only
/// consulted when the message has lifecheck enabled. A missing row or
/// a null `last_ping_at` both mean "never checked in" and fire
/// immediately. An unparseable `deliver_at` never fires the time
/// trigger; an unparseable `last_ping_at` never fires the lifecheck
/// trigger.
pub fn evaluate(msg: &Message, lifecheck: Option<&LifecheckSettings>, now: DateTime<Utc>) -> Due {
    let by_time = msg
        .deliver_at
        .as_deref()
        .map(|raw| match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => at.with_timezone(&Utc) <= now,
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "unparseable deliver_at ignored");
                false
            }
        })
        .unwrap_or(false);

    let by_lifecheck = msg.lifecheck_enabled
        && match lifecheck {
            None => true,
            Some(lc) => match lc.last_ping_at.as_deref() {
                None => true,
                Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                    Ok(last) => {
                        let grace = lc.grace_minutes.unwrap_or(DEFAULT_GRACE_MINUTES);
                        now - last.with_timezone(&Utc) >= chrono::Duration::minutes(grace)
                    }
                    Err(e) => {
                        warn!(user_id = %lc.user_id, error = %e, "unparseable last_ping_at ignored");
                        false
                    }
                },
            },
        };

    Due {
        by_time,
        by_lifecheck,
    }
}
