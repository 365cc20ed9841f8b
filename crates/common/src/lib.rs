//! Shared identifier and version types used across the allocation crates.

mod types;

pub use types::{BatchReference, OrderId, Sku, Version};
