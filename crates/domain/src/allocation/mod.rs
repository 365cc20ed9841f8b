//! Allocation aggregate and related types.

mod batch;
mod commands;
mod events;
mod order_line;
mod product;

pub use batch::{Batch, Eligibility};
pub use commands::{
    Allocate, ChangeBatchQuantity, Command, CommandKind, CreateBatch, Deallocate,
};
pub use events::{
    AllocatedData, AllocationsEmptyData, BatchCreatedData, DeallocatedData, Event, EventKind,
    OrderAlreadyAllocatedData, OutOfStockData,
};
pub use order_line::OrderLine;
pub use product::{Allocation, Product};
