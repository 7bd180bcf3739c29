//! Client-side product store.
//!
//! [`ProductStore`] owns the product collection, the selection and the list
//! filters. Every mutation goes through its commands, which apply a
//! speculative patch, hand the write to the gateway and then reconcile with a
//! fresh snapshot. Clones share the same state.

pub mod policy;
pub mod state;

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

use crate::errors::{ServiceError, SAVE_FAILED_MESSAGE};
use crate::events::{EventSender, StoreEvent};
use crate::gateway::ProductGateway;
use crate::models::{Product, ProductChanges, ProductPayload, StatusFilter, Step};
use crate::services::status::{Clock, ProductMetrics, SystemClock};

pub use policy::CompletionPolicy;
pub use state::{FetchOutcome, FetchTicket, PendingMutation, StoreState};

/// Result of a save, as far as the client can tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The reconciling snapshot shows the change. For `add`, the id the
    /// gateway assigned.
    Confirmed { product_id: Option<String> },
    /// The write was handed over but no snapshot shows it (yet).
    Unconfirmed { reason: String },
    /// The write never reached the gateway; local state was rolled back.
    TransportFailure { reason: String },
}

impl SaveOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => "confirmed",
            Self::Unconfirmed { .. } => "unconfirmed",
            Self::TransportFailure { .. } => "transport_failure",
        }
    }
}

/// Read-only picture of the store's flags and selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreView {
    pub product_count: usize,
    pub current_product_id: Option<String>,
    pub is_loading: bool,
    pub is_saving: bool,
    pub error: Option<String>,
    pub pending_mutations: usize,
    pub search_query: String,
    pub status_filter: String,
}

#[derive(Clone)]
pub struct ProductStore {
    gateway: Arc<dyn ProductGateway>,
    state: Arc<RwLock<StoreState>>,
    clock: Arc<dyn Clock>,
    policy: CompletionPolicy,
    events: EventSender,
}

impl ProductStore {
    pub fn new(gateway: Arc<dyn ProductGateway>) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(StoreState::new())),
            clock: Arc::new(SystemClock),
            policy: CompletionPolicy::default(),
            events: EventSender::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Replaces the collection with the gateway's current snapshot.
    ///
    /// A non-silent fetch raises the loading flag while it runs. Snapshots
    /// are ordered by request: one that completes after a newer request's
    /// snapshot was applied is dropped and reported as `Superseded`.
    #[instrument(skip(self))]
    pub async fn fetch_products(&self, silent: bool) -> Result<FetchOutcome, ServiceError> {
        let ticket = self.state.write().await.begin_fetch(silent);
        if !silent {
            self.events
                .send_or_log(StoreEvent::LoadingChanged { loading: true });
        }

        let result = self.gateway.fetch_products().await;

        let mut state = self.state.write().await;
        let selection_before = state.current_id().map(str::to_owned);
        match result {
            Ok(products) => {
                let outcome = state.complete_fetch(ticket, products);
                let selection_after = state.current_id().map(str::to_owned);
                let loading = state.is_loading();
                drop(state);

                if !silent {
                    self.events.send_or_log(StoreEvent::LoadingChanged { loading });
                }
                match outcome {
                    FetchOutcome::Applied { count } => {
                        debug!(count, seq = ticket.seq(), "applied product snapshot");
                        self.events
                            .send_or_log(StoreEvent::ProductsChanged { count });
                        if selection_before != selection_after {
                            self.events.send_or_log(StoreEvent::SelectionChanged {
                                product_id: selection_after,
                            });
                        }
                    }
                    FetchOutcome::Superseded => {
                        counter!("store.fetch.superseded", 1);
                        debug!(seq = ticket.seq(), "discarded snapshot from an older request");
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                state.fail_fetch(ticket);
                let message = state.error().unwrap_or_default().to_string();
                let loading = state.is_loading();
                drop(state);

                error!(error = %err, silent, "failed to fetch products");
                self.events.send_or_log(StoreEvent::ErrorRaised { message });
                if !silent {
                    self.events.send_or_log(StoreEvent::LoadingChanged { loading });
                }
                Err(err)
            }
        }
    }

    /// Sends a mutation and reconciles.
    ///
    /// `edit`/`update`/`delete` are shown immediately as speculative patches
    /// and reconciled with a silent refetch; `add` waits for a visible
    /// refetch to learn its id. A write that cannot be delivered rolls back
    /// its patch, raises the error flag and triggers a silent refetch.
    ///
    /// Returns `Err` only for writes rejected locally before anything changed.
    #[instrument(skip(self, payload), fields(action = %payload.action(), id = ?payload.target_id()))]
    pub async fn save_product(&self, mut payload: ProductPayload) -> Result<SaveOutcome, ServiceError> {
        self.validate(&mut payload).await?;

        let (op_id, previous_ids, count, selection) = {
            let mut state = self.state.write().await;
            let previous_ids: HashSet<String> =
                state.snapshot().iter().map(|p| p.id.clone()).collect();
            let op_id = state.begin_save(&payload);
            (
                op_id,
                previous_ids,
                state.products().len(),
                state.current_id().map(str::to_owned),
            )
        };

        self.events
            .send_or_log(StoreEvent::SavingChanged { saving: true });
        if op_id.is_some() {
            self.events.send_or_log(StoreEvent::ProductsChanged { count });
            self.events.send_or_log(StoreEvent::SelectionChanged {
                product_id: selection,
            });
        }

        let submitted = self.gateway.submit(&payload).await;

        let (saving, count) = {
            let mut state = self.state.write().await;
            state.settle_save(op_id, submitted.is_ok());
            (state.is_saving(), state.products().len())
        };
        self.events.send_or_log(StoreEvent::SavingChanged { saving });
        self.events.send_or_log(StoreEvent::mutation_settled(
            payload.action(),
            payload.target_id().map(str::to_owned),
            submitted.is_ok(),
        ));

        let receipt = match submitted {
            Ok(receipt) => receipt,
            Err(err) => {
                counter!("store.save.outcome.transport_failure", 1);
                error!(error = %err, "failed to save product; restoring gateway state");
                self.events.send_or_log(StoreEvent::ErrorRaised {
                    message: SAVE_FAILED_MESSAGE.to_string(),
                });
                self.events.send_or_log(StoreEvent::ProductsChanged { count });

                if let Err(fetch_err) = self.fetch_products(true).await {
                    warn!(error = %fetch_err, "restoring refetch failed");
                }
                return Ok(SaveOutcome::TransportFailure {
                    reason: err.to_string(),
                });
            }
        };

        let silent = !matches!(payload, ProductPayload::Add(_));
        if let Err(err) = self.fetch_products(silent).await {
            counter!("store.save.outcome.unconfirmed", 1);
            return Ok(SaveOutcome::Unconfirmed {
                reason: format!("reconciling fetch failed: {}", err),
            });
        }

        let state = self.state.read().await;
        let outcome = match confirmation(&payload, state.snapshot(), &previous_ids) {
            Some(product_id) => {
                counter!("store.save.outcome.confirmed", 1);
                info!(product_id = ?product_id, "save confirmed by snapshot");
                SaveOutcome::Confirmed { product_id }
            }
            None => {
                counter!("store.save.outcome.unconfirmed", 1);
                warn!(status = ?receipt.status, "gateway snapshot does not show the change");
                SaveOutcome::Unconfirmed {
                    reason: "change not visible in gateway snapshot".to_string(),
                }
            }
        };
        Ok(outcome)
    }

    pub async fn delete_product(&self, id: &str) -> Result<SaveOutcome, ServiceError> {
        self.save_product(ProductPayload::delete(id)).await
    }

    async fn validate(&self, payload: &mut ProductPayload) -> Result<(), ServiceError> {
        let existing = match payload.target_id() {
            Some(id) => self.state.read().await.find(id).cloned(),
            None => None,
        };

        match payload {
            ProductPayload::Add(changes) => {
                let named = changes
                    .name
                    .as_deref()
                    .map(|name| !name.trim().is_empty())
                    .unwrap_or(false);
                if !named {
                    return Err(ServiceError::ValidationError(
                        "a new product needs a name".to_string(),
                    ));
                }
                changes.validate()?;
            }
            ProductPayload::Edit(target) | ProductPayload::Update(target) => {
                if target.id.trim().is_empty() {
                    return Err(ServiceError::ValidationError("missing product id".to_string()));
                }
                // Rows loaded from the gateway may carry names the form would
                // refuse; only a name that actually changes is checked.
                let renames = match (&target.changes.name, &existing) {
                    (Some(name), Some(product)) => *name != product.name,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if renames {
                    target.changes.validate()?;
                } else {
                    ProductChanges {
                        name: None,
                        ..target.changes.clone()
                    }
                    .validate()?;
                }
            }
            ProductPayload::Delete(target) => {
                if target.id.trim().is_empty() {
                    return Err(ServiceError::ValidationError("missing product id".to_string()));
                }
            }
        }

        self.policy.enforce(payload, existing.as_ref())
    }

    // ------------------------------------------------------------------
    // Production and checklist commands
    // ------------------------------------------------------------------

    /// Adds `units` produced today to the order's completed quantity.
    pub async fn record_production(&self, id: &str, units: u64) -> Result<SaveOutcome, ServiceError> {
        if units == 0 {
            return Err(ServiceError::ValidationError(
                "produced units must be positive".to_string(),
            ));
        }
        self.update_row(id, |product| {
            product.completed_qty = product.completed_qty.saturating_add(units);
            Ok(())
        })
        .await
    }

    pub async fn add_step(&self, id: &str, name: &str) -> Result<SaveOutcome, ServiceError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "step name cannot be empty".to_string(),
            ));
        }
        self.update_row(id, move |product| {
            product.steps.push(Step::new(name));
            Ok(())
        })
        .await
    }

    pub async fn toggle_step(&self, id: &str, index: usize) -> Result<SaveOutcome, ServiceError> {
        self.update_row(id, |product| {
            let step = product
                .steps
                .get_mut(index)
                .ok_or_else(|| step_out_of_range(index))?;
            step.done = !step.done;
            Ok(())
        })
        .await
    }

    pub async fn remove_step(&self, id: &str, index: usize) -> Result<SaveOutcome, ServiceError> {
        self.update_row(id, |product| {
            if index >= product.steps.len() {
                return Err(step_out_of_range(index));
            }
            product.steps.remove(index);
            Ok(())
        })
        .await
    }

    /// Sends the whole row of `id` as an `update` after applying `change`.
    async fn update_row<F>(&self, id: &str, change: F) -> Result<SaveOutcome, ServiceError>
    where
        F: FnOnce(&mut Product) -> Result<(), ServiceError>,
    {
        let mut product = self.product(id).await?;
        change(&mut product)?;
        self.save_product(ProductPayload::update(
            id,
            ProductChanges::from_product(&product),
        ))
        .await
    }

    // ------------------------------------------------------------------
    // Selection, filters and reads
    // ------------------------------------------------------------------

    pub async fn select_product(&self, id: &str) -> Result<Product, ServiceError> {
        let mut state = self.state.write().await;
        if !state.select(id) {
            return Err(ServiceError::NotFound(format!("product {} not found", id)));
        }
        let product = state.current_product().cloned();
        drop(state);

        self.events.send_or_log(StoreEvent::SelectionChanged {
            product_id: Some(id.to_string()),
        });
        product.ok_or_else(|| ServiceError::NotFound(format!("product {} not found", id)))
    }

    pub async fn set_search_query(&self, query: impl Into<String>) {
        let mut state = self.state.write().await;
        state.set_search_query(query);
        let event = filters_event(&state);
        drop(state);
        self.events.send_or_log(event);
    }

    pub async fn set_status_filter(&self, filter: StatusFilter) {
        let mut state = self.state.write().await;
        state.set_status_filter(filter);
        let event = filters_event(&state);
        drop(state);
        self.events.send_or_log(event);
    }

    /// The collection narrowed by the current search query and status filter.
    pub async fn filtered_products(&self) -> Vec<Product> {
        let today = self.clock.today();
        self.state.read().await.filtered_products(today)
    }

    pub async fn products(&self) -> Vec<Product> {
        self.state.read().await.products().to_vec()
    }

    pub async fn product(&self, id: &str) -> Result<Product, ServiceError> {
        self.state
            .read()
            .await
            .find(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", id)))
    }

    pub async fn current_product(&self) -> Option<Product> {
        self.state.read().await.current_product().cloned()
    }

    pub async fn metrics_for(&self, id: &str) -> Result<ProductMetrics, ServiceError> {
        let product = self.product(id).await?;
        Ok(ProductMetrics::compute(&product, self.clock.today()))
    }

    pub async fn view(&self) -> StoreView {
        let state = self.state.read().await;
        StoreView {
            product_count: state.products().len(),
            current_product_id: state.current_id().map(str::to_owned),
            is_loading: state.is_loading(),
            is_saving: state.is_saving(),
            error: state.error().map(str::to_owned),
            pending_mutations: state.pending().len(),
            search_query: state.search_query().to_string(),
            status_filter: state.status_filter().to_string(),
        }
    }

    pub async fn clear_error(&self) {
        self.state.write().await.clear_error();
    }
}

fn filters_event(state: &StoreState) -> StoreEvent {
    StoreEvent::FiltersChanged {
        search_query: state.search_query().to_string(),
        status_filter: state.status_filter(),
    }
}

fn step_out_of_range(index: usize) -> ServiceError {
    ServiceError::ValidationError(format!("no checklist step at position {}", index))
}

/// `Some(id)` when `snapshot` shows the effect of `payload`.
fn confirmation(
    payload: &ProductPayload,
    snapshot: &[Product],
    previous_ids: &HashSet<String>,
) -> Option<Option<String>> {
    match payload {
        ProductPayload::Add(changes) => snapshot
            .iter()
            .filter(|p| !previous_ids.contains(&p.id))
            .find(|p| changes.name.as_deref().map_or(true, |name| p.name == name))
            .map(|p| Some(p.id.clone())),
        ProductPayload::Edit(target) | ProductPayload::Update(target) => snapshot
            .iter()
            .find(|p| p.id == target.id)
            .filter(|p| target.changes.is_reflected_in(p))
            .map(|p| Some(p.id.clone())),
        ProductPayload::Delete(target) => {
            if snapshot.iter().any(|p| p.id == target.id) {
                None
            } else {
                Some(Some(target.id.clone()))
            }
        }
    }
}
