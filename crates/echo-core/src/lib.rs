//! `echo-core` — shared configuration and constants for the Echo
//! delivery service.

pub mod config;
pub mod error;

pub use config::EchoConfig;
pub use error::{EchoError, Result};
