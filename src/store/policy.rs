use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ServiceError;
use crate::models::{Product, ProductPayload};

/// What to do with a write that records more units done than ordered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompletionPolicy {
    /// Send as-is; the display clamps remaining units at zero.
    #[default]
    Allow,
    /// Lower `completedQty` to the order total.
    Clamp,
    /// Refuse the write.
    Reject,
}

impl CompletionPolicy {
    /// Checks `payload` against the order total, adjusting it under `Clamp`.
    ///
    /// The total is the payload's own `qty` or else the current product's.
    /// A total of zero means "not set yet" and is never enforced.
    pub fn enforce(
        &self,
        payload: &mut ProductPayload,
        existing: Option<&Product>,
    ) -> Result<(), ServiceError> {
        let Some(changes) = payload.changes_mut() else {
            return Ok(());
        };
        let Some(completed) = changes.completed_qty else {
            return Ok(());
        };
        let total = changes
            .qty
            .or_else(|| existing.map(|p| p.total_qty))
            .unwrap_or(0);
        if total == 0 || completed <= total {
            return Ok(());
        }

        match self {
            Self::Allow => Ok(()),
            Self::Clamp => {
                changes.completed_qty = Some(total);
                Ok(())
            }
            Self::Reject => Err(ServiceError::ValidationError(format!(
                "completed quantity {} exceeds order total {}",
                completed, total
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductChanges;

    fn produce(id: &str, completed: u64) -> ProductPayload {
        ProductPayload::update(
            id,
            ProductChanges {
                completed_qty: Some(completed),
                ..Default::default()
            },
        )
    }

    #[test]
    fn allow_leaves_over_completion_alone() {
        let product = Product::new("a", "A").with_quantities(10, 9);
        let mut payload = produce("a", 15);
        CompletionPolicy::Allow
            .enforce(&mut payload, Some(&product))
            .unwrap();
        assert_eq!(payload.changes().unwrap().completed_qty, Some(15));
    }

    #[test]
    fn clamp_caps_at_existing_total() {
        let product = Product::new("a", "A").with_quantities(10, 9);
        let mut payload = produce("a", 15);
        CompletionPolicy::Clamp
            .enforce(&mut payload, Some(&product))
            .unwrap();
        assert_eq!(payload.changes().unwrap().completed_qty, Some(10));
    }

    #[test]
    fn reject_uses_payload_total_first() {
        let product = Product::new("a", "A").with_quantities(100, 0);
        let mut payload = ProductPayload::edit(
            "a",
            ProductChanges {
                qty: Some(5),
                completed_qty: Some(6),
                ..Default::default()
            },
        );
        let err = CompletionPolicy::Reject
            .enforce(&mut payload, Some(&product))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn zero_total_is_not_enforced() {
        let mut payload = produce("a", 3);
        assert!(CompletionPolicy::Reject.enforce(&mut payload, None).is_ok());
    }

    #[test]
    fn parses_from_config_strings() {
        assert_eq!("clamp".parse::<CompletionPolicy>().unwrap(), CompletionPolicy::Clamp);
        assert_eq!(CompletionPolicy::Reject.to_string(), "reject");
    }
}
