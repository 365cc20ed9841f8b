//! Allocation domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Batch, OrderLine};

/// Events raised by the product aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// An order line was allocated to a batch.
    Allocated(AllocatedData),

    /// An order line was released from a batch.
    Deallocated(DeallocatedData),

    /// A batch was added to a product.
    BatchCreated(BatchCreatedData),

    /// No batch could take an order line.
    OutOfStock(OutOfStockData),

    /// The order line was already allocated within the product.
    OrderAlreadyAllocated(OrderAlreadyAllocatedData),

    /// A deallocation found no allocated line to release.
    AllocationsEmpty(AllocationsEmptyData),
}

/// Closed tag for each event type, used to route events to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Allocated,
    Deallocated,
    BatchCreated,
    OutOfStock,
    OrderAlreadyAllocated,
    AllocationsEmpty,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 6] = [
        EventKind::Allocated,
        EventKind::Deallocated,
        EventKind::BatchCreated,
        EventKind::OutOfStock,
        EventKind::OrderAlreadyAllocated,
        EventKind::AllocationsEmpty,
    ];

    /// Returns the event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Allocated => "Allocated",
            EventKind::Deallocated => "Deallocated",
            EventKind::BatchCreated => "BatchCreated",
            EventKind::OutOfStock => "OutOfStock",
            EventKind::OrderAlreadyAllocated => "OrderAlreadyAllocated",
            EventKind::AllocationsEmpty => "AllocationsEmpty",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl DomainEvent for Event {
    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Data for Allocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedData {
    pub order_id: OrderId,
    pub batch_ref: BatchReference,
    pub sku: Sku,
    pub qty: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for Deallocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeallocatedData {
    pub batch_ref: BatchReference,
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Data for BatchCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreatedData {
    pub batch_ref: BatchReference,
    pub sku: Sku,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Data for OutOfStock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStockData {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Data for OrderAlreadyAllocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAlreadyAllocatedData {
    pub order_id: OrderId,
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

/// Data for AllocationsEmpty event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationsEmptyData {
    pub sku: Sku,
    pub occurred_at: DateTime<Utc>,
}

// Event constructors
impl Event {
    pub fn allocated(line: &OrderLine, batch_ref: &BatchReference) -> Self {
        Event::Allocated(AllocatedData {
            order_id: line.order_id().clone(),
            batch_ref: batch_ref.clone(),
            sku: line.sku().clone(),
            qty: line.qty(),
            occurred_at: Utc::now(),
        })
    }

    pub fn deallocated(batch_ref: &BatchReference, line: &OrderLine) -> Self {
        Event::Deallocated(DeallocatedData {
            batch_ref: batch_ref.clone(),
            order_id: line.order_id().clone(),
            sku: line.sku().clone(),
            qty: line.qty(),
            occurred_at: Utc::now(),
        })
    }

    pub fn batch_created(batch: &Batch) -> Self {
        Event::BatchCreated(BatchCreatedData {
            batch_ref: batch.reference().clone(),
            sku: batch.sku().clone(),
            qty: batch.purchased_quantity(),
            eta: batch.eta(),
            occurred_at: Utc::now(),
        })
    }

    pub fn out_of_stock(sku: Sku) -> Self {
        Event::OutOfStock(OutOfStockData {
            sku,
            occurred_at: Utc::now(),
        })
    }

    pub fn order_already_allocated(line: &OrderLine) -> Self {
        Event::OrderAlreadyAllocated(OrderAlreadyAllocatedData {
            order_id: line.order_id().clone(),
            sku: line.sku().clone(),
            occurred_at: Utc::now(),
        })
    }

    pub fn allocations_empty(sku: Sku) -> Self {
        Event::AllocationsEmpty(AllocationsEmptyData {
            sku,
            occurred_at: Utc::now(),
        })
    }
}

// Query methods
impl Event {
    /// Returns the closed tag for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Allocated(_) => EventKind::Allocated,
            Event::Deallocated(_) => EventKind::Deallocated,
            Event::BatchCreated(_) => EventKind::BatchCreated,
            Event::OutOfStock(_) => EventKind::OutOfStock,
            Event::OrderAlreadyAllocated(_) => EventKind::OrderAlreadyAllocated,
            Event::AllocationsEmpty(_) => EventKind::AllocationsEmpty,
        }
    }

    /// Returns when the event was raised.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Event::Allocated(data) => data.occurred_at,
            Event::Deallocated(data) => data.occurred_at,
            Event::BatchCreated(data) => data.occurred_at,
            Event::OutOfStock(data) => data.occurred_at,
            Event::OrderAlreadyAllocated(data) => data.occurred_at,
            Event::AllocationsEmpty(data) => data.occurred_at,
        }
    }

    /// Returns the sku the event concerns.
    pub fn sku(&self) -> &Sku {
        match self {
            Event::Allocated(data) => &data.sku,
            Event::Deallocated(data) => &data.sku,
            Event::BatchCreated(data) => &data.sku,
            Event::OutOfStock(data) => &data.sku,
            Event::OrderAlreadyAllocated(data) => &data.sku,
            Event::AllocationsEmpty(data) => &data.sku,
        }
    }
}
