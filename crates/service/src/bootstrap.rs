//! Default wiring of handlers onto a message bus.

use domain::{CommandKind, EventKind};

use crate::error::BusConfigError;
use crate::handlers::{
    AddBatch, Allocate, ChangeBatchQuantity, Deallocate, PublishEvent, ReportDuplicateAllocation,
    SendOutOfStockNotification,
};
use crate::message_bus::MessageBus;
use crate::notifications::Notifications;
use crate::publisher::EventPublisher;
use crate::unit_of_work::UnitOfWork;

/// Events published to external channels.
pub const PUBLISHED_EVENTS: [EventKind; 3] = [
    EventKind::Allocated,
    EventKind::Deallocated,
    EventKind::BatchCreated,
];

/// Builds the allocation message bus.
///
/// `AllocationsEmpty` deliberately has no handler.
pub fn message_bus<U, P, N>(
    publisher: P,
    notifications: N,
) -> Result<MessageBus<U>, BusConfigError>
where
    U: UnitOfWork,
    P: EventPublisher + 'static,
    N: Notifications + 'static,
{
    MessageBus::builder()
        .command(CommandKind::Allocate, Allocate)
        .command(CommandKind::Deallocate, Deallocate)
        .command(CommandKind::CreateBatch, AddBatch)
        .command(CommandKind::ChangeBatchQuantity, ChangeBatchQuantity)
        .event(
            EventKind::OutOfStock,
            SendOutOfStockNotification::new(notifications),
        )
        .event(EventKind::OrderAlreadyAllocated, ReportDuplicateAllocation)
        .events(&PUBLISHED_EVENTS, PublishEvent::new(publisher))
        .build()
}
