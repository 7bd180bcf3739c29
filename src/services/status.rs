//! Derived production metrics.
//!
//! Everything here is a pure function of a product and "today", so the same
//! numbers drive list filtering and the detail view.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::models::{Product, ProductStatus};

/// Orders due in fewer than this many days are urgent.
pub const URGENT_WINDOW_DAYS: i64 = 3;

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Whole days from `today` until `deadline`; negative once overdue.
pub fn days_left(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

/// Units per day needed to finish on time, or 0 when there is nothing left
/// to make or no day left to make it in.
pub fn daily_target(remaining: u64, days_left: Option<i64>) -> u64 {
    match days_left {
        Some(days) if remaining > 0 && days > 0 => remaining.div_ceil(days as u64),
        _ => 0,
    }
}

/// Percentage of the order completed, rounded and capped at 100.
pub fn efficiency(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (completed as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

pub fn classify(completed: u64, total: u64, days_left: Option<i64>) -> ProductStatus {
    if total > 0 && completed >= total {
        ProductStatus::Completed
    } else if matches!(days_left, Some(days) if days < URGENT_WINDOW_DAYS) {
        ProductStatus::Urgent
    } else {
        ProductStatus::Active
    }
}

pub fn status_of(product: &Product, today: NaiveDate) -> ProductStatus {
    let days = product.deadline.map(|deadline| days_left(deadline, today));
    classify(product.completed_qty, product.total_qty, days)
}

/// Snapshot of every derived figure shown for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductMetrics {
    pub total: u64,
    pub completed: u64,
    pub remaining: u64,
    pub efficiency: u8,
    pub days_left: Option<i64>,
    pub is_overdue: bool,
    pub daily_target: u64,
    pub status: ProductStatus,
    pub steps_done: usize,
    pub steps_total: usize,
}

impl ProductMetrics {
    pub fn compute(product: &Product, today: NaiveDate) -> Self {
        let total = product.total_qty;
        let completed = product.completed_qty;
        let remaining = product.remaining_qty();
        let days = product.deadline.map(|deadline| days_left(deadline, today));

        Self {
            total,
            completed,
            remaining,
            efficiency: efficiency(completed, total),
            days_left: days,
            is_overdue: days.map(|d| d < 0).unwrap_or(false),
            daily_target: daily_target(remaining, days),
            status: classify(completed, total, days),
            steps_done: product.steps_done(),
            steps_total: product.steps.len(),
        }
    }
}
