use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{MutationAction, StatusFilter};

/// Default capacity of the store's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Store changes a presentation layer re-renders on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The visible collection changed (snapshot applied or optimistic patch).
    ProductsChanged { count: usize },
    SelectionChanged { product_id: Option<String> },
    LoadingChanged { loading: bool },
    SavingChanged { saving: bool },
    ErrorRaised { message: String },
    FiltersChanged {
        search_query: String,
        #[serde(serialize_with = "serialize_filter")]
        status_filter: StatusFilter,
    },
    /// A write settled; `delivered` is false when it never reached the gateway.
    MutationSettled {
        action: String,
        product_id: Option<String>,
        delivered: bool,
    },
}

impl StoreEvent {
    pub fn mutation_settled(
        action: MutationAction,
        product_id: Option<String>,
        delivered: bool,
    ) -> Self {
        Self::MutationSettled {
            action: action.to_string(),
            product_id,
            delivered,
        }
    }
}

fn serialize_filter<S>(filter: &StatusFilter, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(filter)
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventSender {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event`; having no subscribers is not an error.
    pub fn send_or_log(&self, event: StoreEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!(event = ?event, "no store subscribers");
        }
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
