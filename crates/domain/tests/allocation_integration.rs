//! Integration tests for the allocation domain model.
//!
//! These tests drive the Product aggregate through longer command sequences
//! and check the batch quantity invariants hold throughout.

use chrono::NaiveDate;
use domain::{
    Aggregate, Allocation, Batch, BatchReference, DomainEvent, Event, EventKind, OrderLine,
    Product, Version,
};

fn eta(day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2011, 1, day)
}

fn warehouse() -> Product {
    Product::new(
        "SMALL-TABLE",
        vec![
            Batch::new("ship-2", "SMALL-TABLE", 20, eta(2)),
            Batch::new("stock", "SMALL-TABLE", 20, None),
            Batch::new("ship-1", "SMALL-TABLE", 20, eta(1)),
        ],
    )
}

fn total_available(product: &Product) -> i64 {
    product.batches().iter().map(Batch::available_quantity).sum()
}

mod allocation_policy {
    use super::*;

    #[test]
    fn fills_batches_in_eta_order() {
        let mut product = warehouse();

        let chosen: Vec<_> = (0..6)
            .map(|i| product.allocate(OrderLine::new(format!("o{i}"), "SMALL-TABLE", 10)))
            .collect();

        let expected = ["stock", "stock", "ship-1", "ship-1", "ship-2", "ship-2"];
        for (outcome, reference) in chosen.iter().zip(expected) {
            assert_eq!(outcome, &Allocation::Allocated(BatchReference::new(reference)));
        }
        assert_eq!(total_available(&product), 0);
        assert_eq!(product.version(), Version::new(6));

        let outcome = product.allocate(OrderLine::new("o7", "SMALL-TABLE", 1));
        assert_eq!(outcome, Allocation::OutOfStock);
        assert_eq!(product.version(), Version::new(6));
    }

    #[test]
    fn wrong_sku_lines_are_out_of_stock() {
        let mut product = warehouse();

        let outcome = product.allocate(OrderLine::new("o1", "BIG-TABLE", 1));

        assert_eq!(outcome, Allocation::OutOfStock);
        let Some(Event::OutOfStock(data)) = product.latest_event() else {
            panic!("expected OutOfStock event");
        };
        assert_eq!(data.sku.as_str(), "BIG-TABLE");
        assert_eq!(total_available(&product), 60);
    }
}

mod deallocation {
    use super::*;

    #[test]
    fn round_trip_restores_every_batch() {
        let mut product = warehouse();
        let before = total_available(&product);

        for i in 0..5 {
            product.allocate(OrderLine::new(format!("o{i}"), "SMALL-TABLE", 9));
        }
        while product.deallocate().is_some() {}

        assert_eq!(total_available(&product), before);
        assert!(product.batches().iter().all(|batch| !batch.has_allocations()));
        assert_eq!(
            product.latest_event().map(Event::kind),
            Some(EventKind::AllocationsEmpty)
        );
    }

    #[test]
    fn empties_later_shipments_before_stock() {
        let mut product = warehouse();
        for i in 0..3 {
            product.allocate(OrderLine::new(format!("o{i}"), "SMALL-TABLE", 20));
        }
        product.take_events();

        product.deallocate();
        product.deallocate();

        let released: Vec<_> = product
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Deallocated(data) => Some(data.batch_ref),
                _ => None,
            })
            .collect();
        assert_eq!(
            released,
            vec![BatchReference::new("ship-2"), BatchReference::new("ship-1")]
        );
        assert!(product.batch(&BatchReference::new("stock")).unwrap().has_allocations());
    }
}

mod events {
    use super::*;

    #[test]
    fn every_outcome_is_buffered_in_order() {
        let mut product = Product::new("LAMP", Vec::new());
        product.add_batch(Batch::new("b1", "LAMP", 5, None));
        product.allocate(OrderLine::new("o1", "LAMP", 5));
        product.allocate(OrderLine::new("o1", "LAMP", 5));
        product.allocate(OrderLine::new("o2", "LAMP", 5));
        product.deallocate();

        let kinds: Vec<_> = product.take_events().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::BatchCreated,
                EventKind::Allocated,
                EventKind::OrderAlreadyAllocated,
                EventKind::OutOfStock,
                EventKind::Deallocated,
            ]
        );
    }

    #[test]
    fn event_type_names_double_as_channels() {
        let mut product = Product::new("LAMP", vec![Batch::new("b1", "LAMP", 5, None)]);
        product.allocate(OrderLine::new("o1", "LAMP", 1));

        let events = product.take_events();
        assert_eq!(events[0].event_type(), "Allocated");
        assert_eq!(Product::aggregate_type(), "Product");
    }
}
