use async_trait::async_trait;
use domain::{DomainEvent, Event, Message};

use super::unexpected_event;
use crate::error::Result;
use crate::message_bus::EventHandler;
use crate::notifications::Notifications;
use crate::publisher::EventPublisher;
use crate::unit_of_work::UnitOfWork;

/// Where out-of-stock notifications go unless configured otherwise.
pub const DEFAULT_STOCK_DESTINATION: &str = "stock@made.com";

/// Tells the stock team a sku ran out.
pub struct SendOutOfStockNotification<N> {
    notifications: N,
    destination: String,
}

impl<N: Notifications> SendOutOfStockNotification<N> {
    pub fn new(notifications: N) -> Self {
        Self::with_destination(notifications, DEFAULT_STOCK_DESTINATION)
    }

    pub fn with_destination(notifications: N, destination: impl Into<String>) -> Self {
        Self {
            notifications,
            destination: destination.into(),
        }
    }
}

#[async_trait]
impl<U: UnitOfWork, N: Notifications> EventHandler<U> for SendOutOfStockNotification<N> {
    fn name(&self) -> &'static str {
        "send_out_of_stock_notification"
    }

    async fn handle(&self, event: &Event, _uow: &U) -> Result<Vec<Message>> {
        let Event::OutOfStock(data) = event else {
            return Err(unexpected_event(EventHandler::<U>::name(self), event));
        };

        self.notifications
            .send(&self.destination, &format!("Out of stock for {}", data.sku))
            .await?;
        Ok(Vec::new())
    }
}

/// Records attempts to allocate an order line twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportDuplicateAllocation;

#[async_trait]
impl<U: UnitOfWork> EventHandler<U> for ReportDuplicateAllocation {
    fn name(&self) -> &'static str {
        "report_duplicate_allocation"
    }

    async fn handle(&self, event: &Event, _uow: &U) -> Result<Vec<Message>> {
        let Event::OrderAlreadyAllocated(data) = event else {
            return Err(unexpected_event(EventHandler::<U>::name(self), event));
        };

        tracing::warn!(order_id = %data.order_id, sku = %data.sku, "Order line already allocated");
        metrics::counter!("duplicate_allocations_total").increment(1);
        Ok(Vec::new())
    }
}

/// Publishes an event on the channel named after its type.
pub struct PublishEvent<P> {
    publisher: P,
}

impl<P: EventPublisher> PublishEvent<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<U: UnitOfWork, P: EventPublisher> EventHandler<U> for PublishEvent<P> {
    fn name(&self) -> &'static str {
        "publish_event"
    }

    async fn handle(&self, event: &Event, _uow: &U) -> Result<Vec<Message>> {
        self.publisher.publish(event.event_type(), event).await?;
        metrics::counter!("events_published_total", "channel" => event.event_type()).increment(1);
        Ok(Vec::new())
    }
}
