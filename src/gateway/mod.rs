//! Access to the remote product sheet.
//!
//! The gateway is the single source of truth: reads return the entire
//! collection, writes are fire-and-forget. A successful [`ProductGateway::submit`]
//! only means the write was handed over; whether it took effect is learned
//! from the next snapshot.

pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::ServiceError;
use crate::models::{Product, ProductPayload};

pub use http::HttpGateway;

/// Proof that a write left the client, not that it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    /// HTTP status of the write, when the transport exposes one.
    pub status: Option<u16>,
}

impl SubmitReceipt {
    pub fn delivered() -> Self {
        Self { status: None }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductGateway: Send + Sync {
    /// Full snapshot of every product the gateway knows about.
    async fn fetch_products(&self) -> Result<Vec<Product>, ServiceError>;

    /// Hands a mutation to the gateway without reading a result body.
    async fn submit(&self, payload: &ProductPayload) -> Result<SubmitReceipt, ServiceError>;
}
