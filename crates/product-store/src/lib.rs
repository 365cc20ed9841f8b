//! Persistence for [`Product`](domain::Product) aggregates.
//!
//! A [`ProductStore`] hands out [`Transaction`]s. Each transaction is a
//! [`ProductRepository`] that stages writes and applies them atomically on
//! commit, refusing to overwrite a product another transaction changed first.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryProductStore, InMemoryTransaction};
pub use postgres::{PostgresProductStore, PostgresTransaction};
pub use store::{ProductRepository, ProductStore, Transaction};
