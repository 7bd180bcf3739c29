use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

use super::lenient;
use super::product::{Product, Step};

/// Mutation tag carried in the `action` field of every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum MutationAction {
    Add,
    Edit,
    Update,
    Delete,
}

/// Partial set of product fields carried by a mutation.
///
/// Only present fields are written; the gateway keeps every other column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesperson: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designer: Option<String>,
    /// Total quantity ordered (`totalQty` on the product).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<u64>,
    /// `Some(None)` clears the order date.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::date_change",
        serialize_with = "lenient::serialize_date_change"
    )]
    pub order_date: Option<Option<NaiveDate>>,
    /// `Some(None)` clears the deadline.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::date_change",
        serialize_with = "lenient::serialize_date_change"
    )]
    pub deadline: Option<Option<NaiveDate>>,
    /// Image reference (`imageURL` on the product).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Full checklist (`stepsJSON` on the product).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_qty: Option<u64>,
}

impl ProductChanges {
    /// Every writable field of `product`, as a full-row update.
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: Some(product.name.clone()),
            company: Some(product.company.clone()),
            customer: Some(product.customer.clone()),
            salesperson: Some(product.salesperson.clone()),
            designer: Some(product.designer.clone()),
            qty: Some(product.total_qty),
            order_date: Some(product.order_date),
            deadline: Some(product.deadline),
            image: Some(product.image_url.clone()),
            steps: Some(product.steps.clone()),
            completed_qty: Some(product.completed_qty),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow merge: present fields overwrite, absent fields are kept.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(company) = &self.company {
            product.company = company.clone();
        }
        if let Some(customer) = &self.customer {
            product.customer = customer.clone();
        }
        if let Some(salesperson) = &self.salesperson {
            product.salesperson = salesperson.clone();
        }
        if let Some(designer) = &self.designer {
            product.designer = designer.clone();
        }
        if let Some(qty) = self.qty {
            product.total_qty = qty;
        }
        if let Some(order_date) = self.order_date {
            product.order_date = order_date;
        }
        if let Some(deadline) = self.deadline {
            product.deadline = deadline;
        }
        if let Some(image) = &self.image {
            product.image_url = image.clone();
        }
        if let Some(steps) = &self.steps {
            product.steps = steps.clone();
        }
        if let Some(completed_qty) = self.completed_qty {
            product.completed_qty = completed_qty;
        }
    }

    /// True when every present field already holds the same value on `product`.
    pub fn is_reflected_in(&self, product: &Product) -> bool {
        let mut merged = product.clone();
        self.apply_to(&mut merged);
        merged == *product
    }
}

/// Addressed change for `edit` and `update` mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedChanges {
    pub id: String,
    #[serde(flatten)]
    pub changes: ProductChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
}

/// A write sent to the gateway, tagged by `action`.
///
/// `edit` comes from the order form, `update` from production and checklist
/// changes; the gateway treats both as partial updates of an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ProductPayload {
    Add(ProductChanges),
    Edit(TargetedChanges),
    Update(TargetedChanges),
    Delete(ProductRef),
}

impl ProductPayload {
    pub fn add(changes: ProductChanges) -> Self {
        Self::Add(changes)
    }

    pub fn edit(id: impl Into<String>, changes: ProductChanges) -> Self {
        Self::Edit(TargetedChanges {
            id: id.into(),
            changes,
        })
    }

    pub fn update(id: impl Into<String>, changes: ProductChanges) -> Self {
        Self::Update(TargetedChanges {
            id: id.into(),
            changes,
        })
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete(ProductRef { id: id.into() })
    }

    pub fn action(&self) -> MutationAction {
        match self {
            Self::Add(_) => MutationAction::Add,
            Self::Edit(_) => MutationAction::Edit,
            Self::Update(_) => MutationAction::Update,
            Self::Delete(_) => MutationAction::Delete,
        }
    }

    /// Id of the product this write addresses; `None` for `add`.
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Add(_) => None,
            Self::Edit(target) | Self::Update(target) => Some(&target.id),
            Self::Delete(target) => Some(&target.id),
        }
    }

    pub fn changes(&self) -> Option<&ProductChanges> {
        match self {
            Self::Add(changes) => Some(changes),
            Self::Edit(target) | Self::Update(target) => Some(&target.changes),
            Self::Delete(_) => None,
        }
    }

    pub fn changes_mut(&mut self) -> Option<&mut ProductChanges> {
        match self {
            Self::Add(changes) => Some(changes),
            Self::Edit(target) | Self::Update(target) => Some(&mut target.changes),
            Self::Delete(_) => None,
        }
    }

    /// Applies this write to a local collection the way the gateway would,
    /// minus identity assignment: `add` is a no-op here.
    pub fn apply_to(&self, products: &mut Vec<Product>) {
        match self {
            Self::Add(_) => {}
            Self::Edit(target) | Self::Update(target) => {
                if let Some(product) = products.iter_mut().find(|p| p.id == target.id) {
                    target.changes.apply_to(product);
                }
            }
            Self::Delete(target) => products.retain(|p| p.id != target.id),
        }
    }
}
