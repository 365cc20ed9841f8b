//! Service layer for the allocation service.
//!
//! Commands enter through [`MessageBus::handle`]. Each handler opens its own
//! [`unit_of_work::Scope`], changes one product and commits; the events the
//! product raised are then dispatched to event handlers until none are left.

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod message_bus;
pub mod notifications;
pub mod publisher;
pub mod unit_of_work;
pub mod views;

pub use error::{BusConfigError, Result, ServiceError};
pub use message_bus::{CommandHandler, CommandOutput, EventHandler, Handled, MessageBus};
pub use notifications::{InMemoryNotifications, LoggingNotifications, Notifications};
pub use publisher::{EventPublisher, InMemoryPublisher, LoggingPublisher};
pub use unit_of_work::{FakeUnitOfWork, Scope, StoreUnitOfWork, UnitOfWork};
pub use views::AllocationView;
