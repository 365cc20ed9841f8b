use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use common::{BatchReference, Sku};

use super::OrderLine;

/// Whether a batch can take an order line, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The batch can take the line.
    Eligible,
    /// The line is already allocated to this batch.
    AlreadyAllocated,
    /// The batch holds a different sku.
    WrongSku,
    /// The batch has less available stock than the line asks for.
    InsufficientStock,
}

/// A purchasable lot of stock for one sku.
///
/// Identity is the reference alone. A batch without an eta is in stock now;
/// one with an eta is an incoming shipment.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: BTreeSet<OrderLine>,
}

impl Batch {
    /// Creates a new batch with no allocations.
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: BTreeSet::new(),
        }
    }

    /// Rebuilds a batch together with its persisted allocations.
    pub fn restore(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
        allocations: impl IntoIterator<Item = OrderLine>,
    ) -> Self {
        Self {
            allocations: allocations.into_iter().collect(),
            ..Self::new(reference, sku, purchased_quantity, eta)
        }
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    /// Returns the lines currently allocated to this batch.
    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    /// Returns true if at least one line is allocated here.
    pub fn has_allocations(&self) -> bool {
        !self.allocations.is_empty()
    }

    /// Returns true if this exact order line is allocated here.
    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    /// Sum of the quantities of every allocated line.
    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|line| i64::from(line.qty())).sum()
    }

    /// Purchased quantity minus allocated quantity.
    ///
    /// Only negative between a purchased quantity reduction and the evictions
    /// that follow it.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    /// Checks whether the line may be allocated to this batch.
    pub fn can_allocate(&self, line: &OrderLine) -> Eligibility {
        if self.is_allocated(line) {
            Eligibility::AlreadyAllocated
        } else if line.sku() != &self.sku {
            Eligibility::WrongSku
        } else if i64::from(line.qty()) > self.available_quantity() {
            Eligibility::InsufficientStock
        } else {
            Eligibility::Eligible
        }
    }

    /// Compares two batches by allocation priority.
    ///
    /// In-stock batches (no eta) sort first, then shipments by ascending eta.
    pub fn allocation_order(&self, other: &Batch) -> Ordering {
        // Option orders None before Some.
        self.eta.cmp(&other.eta)
    }

    pub(crate) fn allocate(&mut self, line: OrderLine) {
        self.allocations.insert(line);
    }

    pub(crate) fn deallocate_one(&mut self) -> Option<OrderLine> {
        self.allocations.pop_last()
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl Hash for Batch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}
