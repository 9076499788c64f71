//! Domain layer for the Prometheus coordination runtime
//!
//! This module contains core models, errors, and the ports that
//! infrastructure adapters and role behaviours implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
