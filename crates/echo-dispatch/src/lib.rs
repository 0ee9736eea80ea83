//! `echo-dispatch` — the delivery worker core.
//!
//! # Overview
//!
//! One [`runner::Dispatcher`] drives every worker run: it fetches a
//! bounded batch of pending deliveries, evaluates the two delivery
//! triggers for each, claims due rows with a conditional update, and
//! dispatches email via the provider, aggregating a structured
//! [`report::RunReport`].
//!
//! # Pipeline stages
//!
//! | Stage     | Module       | Failure scope                        |
//! |-----------|--------------|--------------------------------------|
//! | Trigger   | `trigger`    | not-due ⇒ skipped, stays pending     |
//! | Claim     | store CAS    | lost race ⇒ skipped, never an error  |
//! | Media     | `media`      | non-fatal, placeholder in the body   |
//! | Compose   | `compose`    | infallible                           |
//! | Send      | `mailer`     | hard per-item failure                |
//!
//! Per-item failures are isolated: the delivery is marked `failed`
//! (error text capped at 1000 bytes) and the run continues. Only a
//! failed batch fetch or the run deadline abort the whole run.

pub mod compose;
pub mod error;
pub mod mailer;
pub mod media;
pub mod report;
pub mod runner;
pub mod trigger;

pub use error::{DispatchError, MailerError, MediaError, RunError};
pub use mailer::{Mailer, ResendMailer};
pub use media::{HmacMediaResolver, MediaResolver};
pub use report::{ItemError, RunReport};
pub use runner::Dispatcher;
