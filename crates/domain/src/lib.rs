//! Domain layer for the allocation service.
//!
//! This crate provides the pure, I/O-free core:
//! - [`OrderLine`], [`Batch`] and the [`Product`] aggregate with the allocation policy
//! - [`Event`] and [`Command`] vocabularies, and the [`Message`] that carries either
//! - [`Aggregate`] and [`DomainEvent`] traits used by the service layer

pub mod aggregate;
pub mod allocation;
pub mod error;
pub mod message;

pub use aggregate::{Aggregate, DomainEvent};
pub use allocation::{
    Allocate, AllocatedData, Allocation, AllocationsEmptyData, Batch, BatchCreatedData,
    ChangeBatchQuantity, Command, CommandKind, CreateBatch, Deallocate, DeallocatedData,
    Eligibility, Event, EventKind, OrderAlreadyAllocatedData, OrderLine, OutOfStockData, Product,
};
pub use common::{BatchReference, OrderId, Sku, Version};
pub use error::DomainError;
pub use message::Message;
