//! Command and event handlers for the allocation service.

mod commands;
mod events;

pub use commands::{AddBatch, Allocate, ChangeBatchQuantity, Deallocate};
pub use events::{
    DEFAULT_STOCK_DESTINATION, PublishEvent, ReportDuplicateAllocation, SendOutOfStockNotification,
};

use domain::{Command, Event};

use crate::error::ServiceError;

fn unexpected_command(handler: &'static str, command: &Command) -> ServiceError {
    ServiceError::UnexpectedMessage {
        handler,
        message: command.kind().as_str(),
    }
}

fn unexpected_event(handler: &'static str, event: &Event) -> ServiceError {
    ServiceError::UnexpectedMessage {
        handler,
        message: event.kind().as_str(),
    }
}
