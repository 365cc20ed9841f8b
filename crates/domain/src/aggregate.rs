//! Core aggregate and domain event traits.

use common::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This doubles as the channel name when events are published externally.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregate roots.
///
/// An aggregate is the consistency boundary all mutations flow through. It
/// carries an optimistic concurrency token and buffers the events its
/// mutations raise until a unit of work collects them.
pub trait Aggregate: Send + Sync {
    /// The type of events this aggregate raises.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Returns the events raised since the buffer was last drained.
    fn pending_events(&self) -> &[Self::Event];

    /// Takes every buffered event, leaving the buffer empty.
    fn take_events(&mut self) -> Vec<Self::Event>;
}
