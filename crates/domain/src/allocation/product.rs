//! Product aggregate.

use common::{BatchReference, OrderId, Sku, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

use super::{Batch, Eligibility, Event, OrderLine};

/// Outcome of [`Product::allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// The line was allocated to the referenced batch.
    Allocated(BatchReference),
    /// No batch had enough stock of the line's sku.
    OutOfStock,
    /// The line is already allocated to a batch of this product.
    AlreadyAllocated,
}

impl Allocation {
    /// Returns the chosen batch, if the line was allocated.
    pub fn batch_reference(&self) -> Option<&BatchReference> {
        match self {
            Allocation::Allocated(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Product aggregate root.
///
/// Owns every batch of one sku. All allocation decisions go through here so
/// that the version number can guard them against concurrent writers.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version: Version,
    events: Vec<Event>,
    changed: bool,
}

impl Product {
    /// Creates a product that has not been persisted yet.
    pub fn new(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version: Version::initial(),
            events: Vec::new(),
            changed: true,
        }
    }

    /// Rebuilds a persisted product.
    pub fn restore(sku: impl Into<Sku>, batches: Vec<Batch>, version: Version) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version,
            events: Vec::new(),
            changed: false,
        }
    }
}

// Query methods
impl Product {
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Returns the batch with the given reference.
    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|batch| batch.reference() == reference)
    }

    /// Returns true if the product holds a batch with this reference.
    pub fn has_batch(&self, reference: &BatchReference) -> bool {
        self.batch(reference).is_some()
    }

    /// Returns every batch holding a line of the given order, with that line.
    pub fn allocations_for<'a>(
        &'a self,
        order_id: &'a OrderId,
    ) -> impl Iterator<Item = (&'a Batch, &'a OrderLine)> + 'a {
        self.batches.iter().flat_map(move |batch| {
            batch
                .allocations()
                .filter(move |line| line.order_id() == order_id)
                .map(move |line| (batch, line))
        })
    }

    /// Returns the most recently raised event still buffered.
    pub fn latest_event(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Returns true if the product differs from its persisted state.
    pub fn has_changes(&self) -> bool {
        self.changed
    }

    /// Indices of the batches in allocation priority order.
    ///
    /// The sort is stable, so batches with the same eta keep insertion order.
    fn by_allocation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.batches.len()).collect();
        order.sort_by(|&a, &b| self.batches[a].allocation_order(&self.batches[b]));
        order
    }
}

// Command methods
impl Product {
    /// Allocates the line to the first eligible batch in allocation order.
    ///
    /// Every outcome is recorded as an event. A line already held by any
    /// batch of this product is never allocated a second time.
    pub fn allocate(&mut self, line: OrderLine) -> Allocation {
        if self.batches.iter().any(|batch| batch.is_allocated(&line)) {
            tracing::debug!(sku = %self.sku, order_id = %line.order_id(), "Order line already allocated");
            self.events.push(Event::order_already_allocated(&line));
            return Allocation::AlreadyAllocated;
        }

        let chosen = self
            .by_allocation_order()
            .into_iter()
            .find(|&index| self.batches[index].can_allocate(&line) == Eligibility::Eligible);

        let Some(index) = chosen else {
            tracing::debug!(sku = %line.sku(), qty = line.qty(), "No batch can take order line");
            self.events.push(Event::out_of_stock(line.sku().clone()));
            return Allocation::OutOfStock;
        };

        let reference = self.batches[index].reference().clone();
        self.events.push(Event::allocated(&line, &reference));
        self.batches[index].allocate(line);
        self.bump_version();

        Allocation::Allocated(reference)
    }

    /// Releases one allocated line from the batch that sorts last in
    /// allocation order among batches holding allocations.
    ///
    /// Among batches with the same eta the earliest added one is picked.
    /// Which line leaves a batch holding several is unspecified.
    pub fn deallocate(&mut self) -> Option<OrderLine> {
        let mut order = self.by_allocation_order();
        // Stable reverse sort keeps insertion order among equal etas.
        order.sort_by(|&a, &b| self.batches[b].allocation_order(&self.batches[a]));

        let released = order.into_iter().find_map(|index| {
            let batch = &mut self.batches[index];
            batch
                .deallocate_one()
                .map(|line| (batch.reference().clone(), line))
        });

        let Some((reference, line)) = released else {
            self.events.push(Event::allocations_empty(self.sku.clone()));
            return None;
        };

        self.events.push(Event::deallocated(&reference, &line));
        self.bump_version();

        Some(line)
    }

    /// Adds a batch to the product.
    ///
    /// The batch is not validated; callers keep references unique and skus
    /// consistent.
    pub fn add_batch(&mut self, batch: Batch) {
        self.events.push(Event::batch_created(&batch));
        self.batches.push(batch);
        self.changed = true;
    }

    /// Sets the purchased quantity of a batch, evicting allocated lines until
    /// the batch is no longer oversold.
    ///
    /// Each eviction raises a `Deallocated` event. The version advances once.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchReference,
        qty: u32,
    ) -> Result<(), DomainError> {
        let Some(batch) = self
            .batches
            .iter_mut()
            .find(|batch| batch.reference() == reference)
        else {
            return Err(DomainError::UnknownBatch {
                sku: self.sku.clone(),
                reference: reference.clone(),
            });
        };

        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            self.events.push(Event::deallocated(reference, &line));
        }

        self.bump_version();
        Ok(())
    }

    fn bump_version(&mut self) {
        self.version = self.version.next();
        self.changed = true;
    }
}

impl Aggregate for Product {
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn version(&self) -> Version {
        self.version
    }

    fn pending_events(&self) -> &[Event] {
        &self.events
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
