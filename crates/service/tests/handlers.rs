//! Handler tests driven through the bootstrapped message bus.
//!
//! Most use the fake unit of work and in-memory recorders, so they exercise
//! the dispatch loop and handler logic without any store.

use chrono::NaiveDate;
use common::{BatchReference, OrderId, Sku};
use domain::{Aggregate, Allocate, ChangeBatchQuantity, CreateBatch, Deallocate, EventKind};
use product_store::InMemoryProductStore;
use service::{
    CommandOutput, FakeUnitOfWork, InMemoryNotifications, InMemoryPublisher, MessageBus,
    ServiceError, StoreUnitOfWork, bootstrap, handlers::DEFAULT_STOCK_DESTINATION,
};

struct Harness {
    bus: MessageBus<FakeUnitOfWork>,
    uow: FakeUnitOfWork,
    publisher: InMemoryPublisher,
    notifications: InMemoryNotifications,
}

impl Harness {
    fn new() -> Self {
        let publisher = InMemoryPublisher::new();
        let notifications = InMemoryNotifications::new();
        let bus = bootstrap::message_bus(publisher.clone(), notifications.clone()).unwrap();
        Self {
            bus,
            uow: FakeUnitOfWork::new(),
            publisher,
            notifications,
        }
    }

    async fn handle(
        &self,
        message: impl Into<domain::Message>,
    ) -> Result<Vec<CommandOutput>, ServiceError> {
        self.bus.handle(message.into(), &self.uow).await
    }
}

fn eta(day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2011, 1, day)
}

mod add_batch {
    use super::*;

    #[tokio::test]
    async fn for_new_product() {
        let harness = Harness::new();

        harness
            .handle(CreateBatch::new("b1", "CRUNCHY-ARMCHAIR", 100, None))
            .await
            .unwrap();

        let product = harness
            .uow
            .product(&Sku::new("CRUNCHY-ARMCHAIR"))
            .await
            .unwrap();
        assert_eq!(product.batches().len(), 1);
        assert_eq!(product.batches()[0].reference(), &BatchReference::new("b1"));
        assert_eq!(product.batches()[0].purchased_quantity(), 100);
        assert!(harness.uow.committed());
    }

    #[tokio::test]
    async fn for_existing_product() {
        let harness = Harness::new();

        harness
            .handle(CreateBatch::new("b1", "GARISH-RUG", 100, None))
            .await
            .unwrap();
        harness
            .handle(CreateBatch::new("b2", "GARISH-RUG", 99, None))
            .await
            .unwrap();

        let product = harness.uow.product(&Sku::new("GARISH-RUG")).await.unwrap();
        let references: Vec<_> = product
            .batches()
            .iter()
            .map(|batch| batch.reference().as_str().to_string())
            .collect();
        assert_eq!(references, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn publishes_batch_created() {
        let harness = Harness::new();

        harness
            .handle(CreateBatch::new("b1", "LAMP", 10, eta(1)))
            .await
            .unwrap();

        assert_eq!(harness.publisher.channels().await, vec!["BatchCreated"]);
    }

    #[tokio::test]
    async fn rejects_reference_already_used_by_the_product() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "LAMP", 10, None))
            .await
            .unwrap();

        let err = harness
            .handle(CreateBatch::new("b1", "LAMP", 10, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::DuplicateBatch(ref reference) if reference.as_str() == "b1"));
        let product = harness.uow.product(&Sku::new("LAMP")).await.unwrap();
        assert_eq!(product.batches().len(), 1);
        assert_eq!(harness.publisher.channels().await, vec!["BatchCreated"]);
    }

    #[tokio::test]
    async fn rejects_reference_used_by_another_product() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "LAMP", 10, None))
            .await
            .unwrap();

        let err = harness
            .handle(CreateBatch::new("b1", "TABLE", 10, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::DuplicateBatch(_)));
        assert!(harness.uow.product(&Sku::new("TABLE")).await.is_none());
        assert_eq!(harness.publisher.channels().await, vec!["BatchCreated"]);
    }

    #[tokio::test]
    async fn duplicate_reference_does_not_add_stock() {
        let uow = StoreUnitOfWork::new(InMemoryProductStore::new());
        let bus = bootstrap::message_bus(InMemoryPublisher::new(), InMemoryNotifications::new())
            .unwrap();
        bus.handle(CreateBatch::new("b1", "LAMP", 10, None).into(), &uow)
            .await
            .unwrap();
        assert!(
            bus.handle(CreateBatch::new("b1", "LAMP", 10, None).into(), &uow)
                .await
                .is_err()
        );

        let first = bus
            .handle(Allocate::new("o1", "LAMP", 10).into(), &uow)
            .await
            .unwrap();
        let second = bus
            .handle(Allocate::new("o2", "LAMP", 10).into(), &uow)
            .await
            .unwrap();

        assert_eq!(
            first,
            vec![CommandOutput::Allocated(BatchReference::new("b1"))]
        );
        assert_eq!(second, vec![CommandOutput::Empty]);
        let product = uow.store().snapshot(&Sku::new("LAMP")).await.unwrap();
        assert_eq!(product.batches().len(), 1);
        assert_eq!(product.batches()[0].available_quantity(), 0);
    }
}

mod allocate {
    use super::*;

    #[tokio::test]
    async fn returns_allocation() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("batch1", "COMPLICATED-LAMP", 100, None))
            .await
            .unwrap();

        let outputs = harness
            .handle(Allocate::new("o1", "COMPLICATED-LAMP", 10))
            .await
            .unwrap();

        assert_eq!(
            outputs,
            vec![CommandOutput::Allocated(BatchReference::new("batch1"))]
        );
        let product = harness
            .uow
            .product(&Sku::new("COMPLICATED-LAMP"))
            .await
            .unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 90);
        assert_eq!(product.version().as_i64(), 1);
    }

    #[tokio::test]
    async fn errors_for_invalid_sku() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "AREALSKU", 100, None))
            .await
            .unwrap();

        let err = harness
            .handle(Allocate::new("o1", "NONEXISTENTSKU", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidSku(sku) if sku.as_str() == "NONEXISTENTSKU"));
    }

    #[tokio::test]
    async fn commits() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "OMINOUS-MIRROR", 100, None))
            .await
            .unwrap();

        harness
            .handle(Allocate::new("o1", "OMINOUS-MIRROR", 10))
            .await
            .unwrap();

        assert!(harness.uow.committed());
        assert_eq!(
            harness.publisher.channels().await,
            vec!["BatchCreated", "Allocated"]
        );
    }

    #[tokio::test]
    async fn sends_notification_when_out_of_stock() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "POPULAR-CURTAINS", 9, None))
            .await
            .unwrap();

        let outputs = harness
            .handle(Allocate::new("o1", "POPULAR-CURTAINS", 10))
            .await
            .unwrap();

        assert_eq!(outputs, vec![CommandOutput::Empty]);
        assert_eq!(
            harness
                .notifications
                .sent_to(DEFAULT_STOCK_DESTINATION)
                .await,
            vec!["Out of stock for POPULAR-CURTAINS"]
        );
    }

    #[tokio::test]
    async fn duplicate_allocation_is_not_an_error() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();
        harness.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();

        let outputs = harness.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();

        assert_eq!(outputs, vec![CommandOutput::Empty]);
        let product = harness.uow.product(&Sku::new("LAMP")).await.unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 90);
    }
}

mod deallocate {
    use super::*;

    #[tokio::test]
    async fn releases_a_line_and_publishes_it() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();
        harness.handle(Allocate::new("o1", "LAMP", 10)).await.unwrap();

        let outputs = harness.handle(Deallocate::new("LAMP")).await.unwrap();

        assert_eq!(outputs, vec![CommandOutput::Deallocated(OrderId::new("o1"))]);
        let product = harness.uow.product(&Sku::new("LAMP")).await.unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 100);
        assert_eq!(
            harness.publisher.channels().await,
            vec!["BatchCreated", "Allocated", "Deallocated"]
        );
    }

    #[tokio::test]
    async fn nothing_to_release_is_empty() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("b1", "LAMP", 100, None))
            .await
            .unwrap();

        let outputs = harness.handle(Deallocate::new("LAMP")).await.unwrap();

        assert_eq!(outputs, vec![CommandOutput::Empty]);
    }

    #[tokio::test]
    async fn errors_for_invalid_sku() {
        let harness = Harness::new();

        let err = harness.handle(Deallocate::new("NOPE")).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidSku(_)));
    }
}

mod change_batch_quantity {
    use super::*;

    #[tokio::test]
    async fn changes_available_quantity() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("batch1", "ADORABLE-SETTEE", 100, None))
            .await
            .unwrap();

        harness
            .handle(ChangeBatchQuantity::new("batch1", 50))
            .await
            .unwrap();

        let product = harness
            .uow
            .product(&Sku::new("ADORABLE-SETTEE"))
            .await
            .unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 50);
    }

    #[tokio::test]
    async fn evicts_lines_when_batch_shrinks() {
        let harness = Harness::new();
        harness
            .handle(CreateBatch::new("batch1", "INDIFFERENT-TABLE", 50, None))
            .await
            .unwrap();
        harness
            .handle(CreateBatch::new("batch2", "INDIFFERENT-TABLE", 50, eta(1)))
            .await
            .unwrap();
        harness
            .handle(Allocate::new("order1", "INDIFFERENT-TABLE", 20))
            .await
            .unwrap();
        harness
            .handle(Allocate::new("order2", "INDIFFERENT-TABLE", 20))
            .await
            .unwrap();

        harness
            .handle(ChangeBatchQuantity::new("batch1", 25))
            .await
            .unwrap();

        let product = harness
            .uow
            .product(&Sku::new("INDIFFERENT-TABLE"))
            .await
            .unwrap();
        let batch1 = product.batch(&BatchReference::new("batch1")).unwrap();
        assert_eq!(batch1.available_quantity(), 5);
        let published = harness.publisher.published().await;
        assert_eq!(
            published
                .iter()
                .filter(|(_, event)| event.kind() == EventKind::Deallocated)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn errors_for_unknown_batch() {
        let harness = Harness::new();

        let err = harness
            .handle(ChangeBatchQuantity::new("missing", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::UnknownBatch(reference) if reference.as_str() == "missing"));
        assert!(!harness.uow.committed());
    }
}
