//! Synchronous core of the product store.
//!
//! The visible collection is always the last authoritative snapshot with the
//! still-pending speculative patches replayed on top, in issue order. Async
//! orchestration lives in [`super::ProductStore`]; everything here is plain
//! data so the reconciliation rules can be tested without a runtime.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::errors::{FETCH_FAILED_MESSAGE, SAVE_FAILED_MESSAGE};
use crate::models::{Product, ProductPayload, StatusFilter};
use crate::services::status;

/// Issued when a fetch starts; snapshots are ordered by ticket, not by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    silent: bool,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What happened to a completed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    /// A snapshot from a later request had already been applied.
    Superseded,
}

/// A speculative patch awaiting an authoritative snapshot.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub op_id: Uuid,
    pub payload: ProductPayload,
    /// Fetch counter value when the write settled; only snapshots requested
    /// after that point can observe it.
    settled_at: Option<u64>,
}

impl PendingMutation {
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

#[derive(Debug, Default)]
pub struct StoreState {
    snapshot: Vec<Product>,
    pending: Vec<PendingMutation>,
    products: Vec<Product>,
    current_id: Option<String>,
    search_query: String,
    status_filter: StatusFilter,
    loading: usize,
    saving: usize,
    error: Option<String>,
    fetch_seq: u64,
    applied_seq: u64,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Visible collection: snapshot plus pending patches.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Last collection received from the gateway, without local patches.
    pub fn snapshot(&self) -> &[Product] {
        &self.snapshot
    }

    pub fn pending(&self) -> &[PendingMutation] {
        &self.pending
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn current_product(&self) -> Option<&Product> {
        let id = self.current_id.as_deref()?;
        self.find(id)
    }

    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    pub fn is_saving(&self) -> bool {
        self.saving > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    /// Products matching the search query and status filter as of `today`.
    pub fn filtered_products(&self, today: NaiveDate) -> Vec<Product> {
        let needle = self.search_query.to_lowercase();
        self.products
            .iter()
            .filter(|p| p.matches_search(&needle))
            .filter(|p| match self.status_filter {
                StatusFilter::All => true,
                filter => filter.matches(status::status_of(p, today)),
            })
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Fetch lifecycle
    // ------------------------------------------------------------------

    pub fn begin_fetch(&mut self, silent: bool) -> FetchTicket {
        self.fetch_seq += 1;
        if !silent {
            self.loading += 1;
            self.error = None;
        }
        FetchTicket {
            seq: self.fetch_seq,
            silent,
        }
    }

    /// Applies a snapshot unless a newer request's snapshot already landed.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, products: Vec<Product>) -> FetchOutcome {
        self.finish_loading(ticket);

        if ticket.seq <= self.applied_seq {
            return FetchOutcome::Superseded;
        }

        self.applied_seq = ticket.seq;
        self.snapshot = products;
        self.pending
            .retain(|op| !matches!(op.settled_at, Some(settled) if ticket.seq > settled));
        self.rebuild();
        self.keep_or_first_selection();

        FetchOutcome::Applied {
            count: self.products.len(),
        }
    }

    pub fn fail_fetch(&mut self, ticket: FetchTicket) {
        self.finish_loading(ticket);
        self.error = Some(FETCH_FAILED_MESSAGE.to_string());
    }

    fn finish_loading(&mut self, ticket: FetchTicket) {
        if !ticket.silent {
            self.loading = self.loading.saturating_sub(1);
        }
    }

    // ------------------------------------------------------------------
    // Save lifecycle
    // ------------------------------------------------------------------

    /// Raises the saving flag and applies the speculative patch, if any.
    ///
    /// `add` has no local identity yet, so it gets no patch and `None` back.
    pub fn begin_save(&mut self, payload: &ProductPayload) -> Option<Uuid> {
        self.saving += 1;

        if matches!(payload, ProductPayload::Add(_)) {
            return None;
        }

        let op_id = Uuid::new_v4();
        self.pending.push(PendingMutation {
            op_id,
            payload: payload.clone(),
            settled_at: None,
        });
        self.rebuild();

        if matches!(payload, ProductPayload::Delete(_)) {
            self.current_id = self.products.first().map(|p| p.id.clone());
        } else {
            self.keep_or_first_selection();
        }

        Some(op_id)
    }

    /// Marks the write as finished.
    ///
    /// A delivered patch stays visible until a later snapshot retires it; an
    /// undelivered one is dropped at once and the error flag is raised.
    pub fn settle_save(&mut self, op_id: Option<Uuid>, delivered: bool) {
        self.saving = self.saving.saturating_sub(1);

        if delivered {
            let seq = self.fetch_seq;
            if let Some(op) = self
                .pending
                .iter_mut()
                .find(|op| Some(op.op_id) == op_id)
            {
                op.settled_at = Some(seq);
            }
            return;
        }

        self.error = Some(SAVE_FAILED_MESSAGE.to_string());
        if let Some(id) = op_id {
            self.pending.retain(|op| op.op_id != id);
            self.rebuild();
            self.keep_or_first_selection();
        }
    }

    // ------------------------------------------------------------------
    // UI state
    // ------------------------------------------------------------------

    /// Returns false when `id` is not in the visible collection.
    pub fn select(&mut self, id: &str) -> bool {
        if self.find(id).is_some() {
            self.current_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn set_status_filter(&mut self, filter: StatusFilter) {
        self.status_filter = filter;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn rebuild(&mut self) {
        let mut products = self.snapshot.clone();
        for op in &self.pending {
            op.payload.apply_to(&mut products);
        }
        self.products = products;
    }

    fn keep_or_first_selection(&mut self) {
        let still_present = self
            .current_id
            .as_deref()
            .map(|id| self.products.iter().any(|p| p.id == id))
            .unwrap_or(false);
        if !still_present {
            self.current_id = self.products.first().map(|p| p.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductChanges, ProductStatus};
    use chrono::Duration;

    fn rename(id: &str, name: &str) -> ProductPayload {
        ProductPayload::edit(
            id,
            ProductChanges {
                name: Some(name.into()),
                ..Default::default()
            },
        )
    }

    fn loaded(products: Vec<Product>) -> StoreState {
        let mut state = StoreState::new();
        let ticket = state.begin_fetch(false);
        state.complete_fetch(ticket, products);
        state
    }

    #[test]
    fn first_snapshot_selects_first_product() {
        let state = loaded(vec![Product::new("a", "A"), Product::new("b", "B")]);
        assert_eq!(state.current_id(), Some("a"));
        assert!(!state.is_loading());
    }

    #[test]
    fn snapshot_preserves_selection_by_id() {
        let mut state = loaded(vec![Product::new("a", "A"), Product::new("b", "B")]);
        assert!(state.select("b"));

        let ticket = state.begin_fetch(true);
        state.complete_fetch(
            ticket,
            vec![Product::new("c", "C"), Product::new("b", "B2")],
        );

        assert_eq!(state.current_product().unwrap().name, "B2");
    }

    #[test]
    fn snapshot_falls_back_to_first_when_selection_vanishes() {
        let mut state = loaded(vec![Product::new("a", "A"), Product::new("b", "B")]);
        state.select("b");

        let ticket = state.begin_fetch(true);
        state.complete_fetch(ticket, vec![Product::new("c", "C")]);
        assert_eq!(state.current_id(), Some("c"));

        let ticket = state.begin_fetch(true);
        state.complete_fetch(ticket, vec![]);
        assert_eq!(state.current_id(), None);
    }

    #[test]
    fn loading_flag_tracks_only_visible_fetches() {
        let mut state = StoreState::new();
        let silent = state.begin_fetch(true);
        assert!(!state.is_loading());

        let visible = state.begin_fetch(false);
        assert!(state.is_loading());

        state.complete_fetch(silent, vec![]);
        assert!(state.is_loading());
        state.fail_fetch(visible);
        assert!(!state.is_loading());
        assert_eq!(state.error(), Some(FETCH_FAILED_MESSAGE));
    }

    #[test]
    fn visible_fetch_clears_previous_error() {
        let mut state = StoreState::new();
        let ticket = state.begin_fetch(true);
        state.fail_fetch(ticket);
        assert!(state.error().is_some());

        state.begin_fetch(true);
        assert!(state.error().is_some());
        state.begin_fetch(false);
        assert!(state.error().is_none());
    }

    #[test]
    fn older_snapshot_arriving_late_is_discarded() {
        let mut state = loaded(vec![Product::new("a", "A")]);

        let older = state.begin_fetch(true);
        let newer = state.begin_fetch(true);

        let outcome = state.complete_fetch(newer, vec![Product::new("a", "A-new")]);
        assert_eq!(outcome, FetchOutcome::Applied { count: 1 });

        let outcome = state.complete_fetch(older, vec![Product::new("a", "A-old")]);
        assert_eq!(outcome, FetchOutcome::Superseded);
        assert_eq!(state.products()[0].name, "A-new");
    }

    #[test]
    fn optimistic_edit_merges_into_visible_product() {
        let mut state = loaded(vec![Product::new("a", "A").with_quantities(10, 3)]);

        let op = state.begin_save(&rename("a", "Renamed"));

        assert!(op.is_some());
        assert!(state.is_saving());
        assert_eq!(state.products()[0].name, "Renamed");
        assert_eq!(state.products()[0].total_qty, 10);
        assert_eq!(state.snapshot()[0].name, "A");
    }

    #[test]
    fn add_is_not_applied_optimistically() {
        let mut state = loaded(vec![Product::new("a", "A")]);
        let op = state.begin_save(&ProductPayload::add(ProductChanges {
            name: Some("New".into()),
            ..Default::default()
        }));
        assert!(op.is_none());
        assert!(state.is_saving());
        assert_eq!(state.products().len(), 1);
    }

    #[test]
    fn deleting_only_product_clears_selection() {
        let mut state = loaded(vec![Product::new("a", "A")]);
        state.begin_save(&ProductPayload::delete("a"));
        assert!(state.products().is_empty());
        assert_eq!(state.current_product(), None);
    }

    #[test]
    fn delete_reselects_first_remaining() {
        let mut state = loaded(vec![
            Product::new("a", "A"),
            Product::new("b", "B"),
            Product::new("c", "C"),
        ]);
        state.select("c");
        state.begin_save(&ProductPayload::delete("b"));
        assert_eq!(state.current_id(), Some("a"));
    }

    #[test]
    fn patch_survives_snapshot_requested_before_write_settled() {
        let mut state = loaded(vec![Product::new("a", "A")]);

        let early = state.begin_fetch(true);
        let op = state.begin_save(&rename("a", "X"));
        state.settle_save(op, true);

        // The early snapshot cannot contain the write.
        state.complete_fetch(early, vec![Product::new("a", "A")]);
        assert_eq!(state.products()[0].name, "X");
        assert_eq!(state.pending().len(), 1);
        assert!(state.pending()[0].is_settled());

        let reconcile = state.begin_fetch(true);
        state.complete_fetch(reconcile, vec![Product::new("a", "X")]);
        assert!(state.pending().is_empty());
        assert_eq!(state.products()[0].name, "X");
    }

    #[test]
    fn unsettled_patch_is_kept_across_snapshots() {
        let mut state = loaded(vec![Product::new("a", "A")]);
        state.begin_save(&rename("a", "X"));

        let ticket = state.begin_fetch(true);
        state.complete_fetch(ticket, vec![Product::new("a", "A")]);
        assert_eq!(state.products()[0].name, "X");
    }

    #[test]
    fn authoritative_snapshot_replaces_optimistic_guess() {
        let mut state = loaded(vec![Product::new("a", "A")]);
        let op = state.begin_save(&rename("a", "X"));
        state.settle_save(op, true);

        // The gateway rejected the edit silently; the snapshot wins.
        let ticket = state.begin_fetch(true);
        state.complete_fetch(ticket, vec![Product::new("a", "A")]);
        assert_eq!(state.products()[0].name, "A");
        assert!(state.pending().is_empty());
    }

    #[test]
    fn failed_write_discards_patch_and_flags_error() {
        let mut state = loaded(vec![Product::new("a", "A"), Product::new("b", "B")]);
        let op = state.begin_save(&ProductPayload::delete("a"));
        assert_eq!(state.products().len(), 1);

        state.settle_save(op, false);

        assert!(!state.is_saving());
        assert_eq!(state.error(), Some(SAVE_FAILED_MESSAGE));
        assert_eq!(state.products().len(), 2);
        assert!(state.pending().is_empty());
    }

    #[test]
    fn filters_by_search_and_status() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut state = loaded(vec![
            Product::new("a", "Clay Pot")
                .with_company("Leafline")
                .with_quantities(10, 10),
            Product::new("b", "Seed Tray")
                .with_company("Greenhouse Co")
                .with_quantities(10, 2)
                .with_deadline(Some(today + Duration::days(1))),
            Product::new("c", "Hanging Pot")
                .with_company("Leafline")
                .with_quantities(10, 2)
                .with_deadline(Some(today + Duration::days(20))),
        ]);

        state.set_search_query("LEAF");
        let ids: Vec<_> = state
            .filtered_products(today)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);

        state.set_search_query("pot");
        state.set_status_filter(StatusFilter::Only(ProductStatus::Active));
        let ids: Vec<_> = state
            .filtered_products(today)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c"]);

        state.set_search_query("");
        state.set_status_filter(StatusFilter::Only(ProductStatus::Urgent));
        let ids: Vec<_> = state
            .filtered_products(today)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn search_query_whitespace_is_significant() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut state = loaded(vec![
            Product::new("a", "Clay Pot"),
            Product::new("b", "Potting bench"),
        ]);

        state.set_search_query(" pot");
        let ids: Vec<_> = state
            .filtered_products(today)
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn select_rejects_unknown_ids() {
        let mut state = loaded(vec![Product::new("a", "A")]);
        assert!(!state.select("zzz"));
        assert_eq!(state.current_id(), Some("a"));
    }
}
