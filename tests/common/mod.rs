#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use production_tracker::{
    errors::ServiceError,
    gateway::{ProductGateway, SubmitReceipt},
    models::{Product, ProductPayload},
    services::status::FixedClock,
    store::ProductStore,
};
use tokio::sync::{mpsc, oneshot};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

pub fn store_for(gateway: Arc<dyn ProductGateway>) -> ProductStore {
    ProductStore::new(gateway).with_clock(Arc::new(FixedClock(today())))
}

/// In-memory stand-in for the spreadsheet behind the gateway.
///
/// Writes are applied the way the sheet script applies them: `add` appends a
/// row with a fresh id, the others merge into or remove the addressed row.
#[derive(Default)]
pub struct FakeSheet {
    rows: Mutex<Vec<Product>>,
    submitted: Mutex<Vec<ProductPayload>>,
    next_id: AtomicU64,
    fail_fetches: AtomicBool,
    fail_submits: AtomicBool,
    drop_writes: AtomicBool,
}

impl FakeSheet {
    pub fn with_rows(rows: Vec<Product>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            next_id: AtomicU64::new(1),
            ..Default::default()
        })
    }

    pub fn rows(&self) -> Vec<Product> {
        self.rows.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<ProductPayload> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fail_fetches(&self, on: bool) {
        self.fail_fetches.store(on, Ordering::SeqCst);
    }

    /// Writes fail before reaching the sheet.
    pub fn fail_submits(&self, on: bool) {
        self.fail_submits.store(on, Ordering::SeqCst);
    }

    /// Writes are accepted but never applied.
    pub fn drop_writes(&self, on: bool) {
        self.drop_writes.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductGateway for FakeSheet {
    async fn fetch_products(&self) -> Result<Vec<Product>, ServiceError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("sheet unreachable".into()));
        }
        Ok(self.rows())
    }

    async fn submit(&self, payload: &ProductPayload) -> Result<SubmitReceipt, ServiceError> {
        self.submitted.lock().unwrap().push(payload.clone());
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("connection reset".into()));
        }
        if self.drop_writes.load(Ordering::SeqCst) {
            return Ok(SubmitReceipt::delivered());
        }

        let mut rows = self.rows.lock().unwrap();
        match payload {
            ProductPayload::Add(changes) => {
                let id = format!("row-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
                let mut product = Product::new(id, "");
                changes.apply_to(&mut product);
                rows.push(product);
            }
            other => other.apply_to(&mut rows),
        }
        Ok(SubmitReceipt::with_status(200))
    }
}

pub type PendingFetch = oneshot::Sender<Result<Vec<Product>, ServiceError>>;

/// Gateway whose reads block until the test answers them, so responses can
/// be delivered in any order. Writes are accepted immediately.
pub struct GatedGateway {
    fetches: mpsc::UnboundedSender<PendingFetch>,
    submitted: Mutex<Vec<ProductPayload>>,
}

impl GatedGateway {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingFetch>) {
        let (fetches, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                fetches,
                submitted: Mutex::new(Vec::new()),
            }),
            rx,
        )
    }

    pub fn submitted(&self) -> Vec<ProductPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductGateway for GatedGateway {
    async fn fetch_products(&self) -> Result<Vec<Product>, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.fetches
            .send(tx)
            .map_err(|_| ServiceError::Transport("test harness gone".into()))?;
        rx.await
            .map_err(|_| ServiceError::Transport("fetch abandoned".into()))?
    }

    async fn submit(&self, payload: &ProductPayload) -> Result<SubmitReceipt, ServiceError> {
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(SubmitReceipt::with_status(200))
    }
}
