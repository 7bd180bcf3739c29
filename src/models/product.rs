use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::lenient;

/// A single checklist entry on a production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
        }
    }
}

/// A production order as the gateway stores it.
///
/// Field names follow the gateway's column headers. Decoding is lenient,
/// see [`lenient`](super::lenient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub customer: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub salesperson: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub designer: String,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub total_qty: u64,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub completed_qty: u64,
    #[serde(
        default,
        deserialize_with = "lenient::date",
        serialize_with = "lenient::serialize_date"
    )]
    pub order_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient::date",
        serialize_with = "lenient::serialize_date"
    )]
    pub deadline: Option<NaiveDate>,
    #[serde(rename = "imageURL", default, deserialize_with = "lenient::text")]
    pub image_url: String,
    #[serde(rename = "stepsJSON", default, deserialize_with = "lenient::steps")]
    pub steps: Vec<Step>,
}

impl Product {
    /// Creates an order with only identity and name set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            company: String::new(),
            customer: String::new(),
            salesperson: String::new(),
            designer: String::new(),
            total_qty: 0,
            completed_qty: 0,
            order_date: None,
            deadline: None,
            image_url: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_quantities(mut self, total_qty: u64, completed_qty: u64) -> Self {
        self.total_qty = total_qty;
        self.completed_qty = completed_qty;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<NaiveDate>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Units still to produce; over-completion reads as zero.
    pub fn remaining_qty(&self) -> u64 {
        self.total_qty.saturating_sub(self.completed_qty)
    }

    /// Case-insensitive substring match on name or company.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.name.to_lowercase().contains(needle)
            || self.company.to_lowercase().contains(needle)
    }

    pub fn steps_done(&self) -> usize {
        self.steps.iter().filter(|step| step.done).count()
    }
}

/// Derived classification of a production order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProductStatus {
    Active,
    Urgent,
    Completed,
}

/// Status filter applied to the product list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ProductStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: ProductStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == status,
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(status) => write!(f, "{}", status),
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.trim().parse::<ProductStatus>().map(Self::Only)
        }
    }
}
