//! Property-based tests for the status calculator and payload merge.
//!
//! These tests use proptest to check invariants across a wide range of
//! quantities, deadlines and partial edits.

use chrono::{Duration, NaiveDate};
use production_tracker::{
    models::{lenient, Product, ProductChanges, ProductStatus},
    services::status::{self, ProductMetrics},
};
use proptest::prelude::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

// Strategies for generating test data
fn quantity_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..10, 0u64..1_000_000]
}

fn offset_strategy() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(-400i64..400)
}

fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z ]{0,24}"
}

fn changes_strategy() -> impl Strategy<Value = ProductChanges> {
    (
        prop::option::of(name_strategy()),
        prop::option::of("[A-Za-z ]{0,16}"),
        prop::option::of(quantity_strategy()),
        prop::option::of(quantity_strategy()),
    )
        .prop_map(|(name, company, qty, completed_qty)| ProductChanges {
            name,
            company,
            qty,
            completed_qty,
            ..Default::default()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn efficiency_stays_within_percent_bounds(done in quantity_strategy(), total in quantity_strategy()) {
        let pct = status::efficiency(done, total);
        prop_assert!(pct <= 100);
        if total == 0 {
            prop_assert_eq!(pct, 0);
        }
        if total > 0 && done >= total {
            prop_assert_eq!(pct, 100);
        }
    }

    #[test]
    fn daily_target_spreads_remaining_work(remaining in quantity_strategy(), days in offset_strategy()) {
        let target = status::daily_target(remaining, days);
        match days {
            Some(d) if d > 0 => {
                prop_assert!(target.saturating_mul(d as u64) >= remaining);
                prop_assert!(target <= remaining);
            }
            _ => prop_assert_eq!(target, 0),
        }
    }

    #[test]
    fn completed_orders_are_never_urgent(
        total in 1u64..10_000,
        extra in 0u64..100,
        offset in offset_strategy(),
    ) {
        let deadline = offset.map(|d| today() + Duration::days(d));
        let product = Product::new("p", "P")
            .with_quantities(total, total + extra)
            .with_deadline(deadline);
        prop_assert_eq!(status::status_of(&product, today()), ProductStatus::Completed);
    }

    #[test]
    fn metrics_are_internally_consistent(
        total in quantity_strategy(),
        done in quantity_strategy(),
        offset in offset_strategy(),
    ) {
        let product = Product::new("p", "P")
            .with_quantities(total, done)
            .with_deadline(offset.map(|d| today() + Duration::days(d)));
        let metrics = ProductMetrics::compute(&product, today());

        prop_assert_eq!(metrics.remaining, total.saturating_sub(done));
        prop_assert_eq!(metrics.days_left, offset);
        prop_assert_eq!(metrics.is_overdue, offset.map(|d| d < 0).unwrap_or(false));
        if metrics.status == ProductStatus::Urgent {
            prop_assert!(offset.map(|d| d < status::URGENT_WINDOW_DAYS).unwrap_or(false));
        }
    }

    #[test]
    fn applied_changes_are_reflected(changes in changes_strategy(), base_qty in quantity_strategy()) {
        let mut product = Product::new("p", "Base").with_quantities(base_qty, 0);
        changes.apply_to(&mut product);

        prop_assert!(changes.is_reflected_in(&product));
        prop_assert_eq!(product.id.as_str(), "p");
        if changes.qty.is_none() {
            prop_assert_eq!(product.total_qty, base_qty);
        }
    }

    #[test]
    fn quantity_cells_never_panic(raw in ".{0,12}") {
        let _ = lenient::parse_date(&raw);
        let json = serde_json::json!({ "id": "p", "totalQty": raw });
        let product: Product = serde_json::from_value(json).unwrap();
        prop_assert_eq!(product.completed_qty, 0);
    }
}
