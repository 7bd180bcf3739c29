//! Production Tracker Library
//!
//! Client-side core of a manufacturing order tracker backed by a
//! spreadsheet-style HTTP gateway: an optimistic product store that
//! reconciles against full snapshots, the derived status calculator and the
//! shared-password session gate.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod models;
pub mod services;
pub mod store;

pub mod prelude {
    pub use crate::auth::{SessionGate, SessionStorage};
    pub use crate::config::AppConfig;
    pub use crate::errors::ServiceError;
    pub use crate::events::StoreEvent;
    pub use crate::gateway::{HttpGateway, ProductGateway, SubmitReceipt};
    pub use crate::models::*;
    pub use crate::services::status::{Clock, ProductMetrics};
    pub use crate::store::{CompletionPolicy, ProductStore, SaveOutcome};
}
