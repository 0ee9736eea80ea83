//! `echo-store` — SQLite row layer for deliveries, messages,
//! recipients, and lifecheck settings.
//!
//! The worker is a pure state-transition actor over these rows: it
//! reads without locks and mutates only through conditional updates.
//! The single concurrency guard is [`DeliveryStore::claim`], which
//! moves a delivery `pending → processing` only while its status is
//! still `pending` at update time (affected-rows CAS). Everything else
//! is a snapshot read; stale content is acceptable because the claim
//! re-validates status, not content.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::DeliveryStore;
pub use types::{Delivery, DeliveryStatus, LifecheckSettings, Message, NewMessage, Recipient};
