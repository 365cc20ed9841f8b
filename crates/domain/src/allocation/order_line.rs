use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use common::{OrderId, Sku};

/// A request to reserve a quantity of a sku for one order.
///
/// Identity is the order id alone: two lines with the same order id are the
/// same line whatever their sku or quantity.
#[derive(Debug, Clone)]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    qty: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }
    }

    /// Returns the order this line belongs to.
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Returns the requested sku.
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the requested quantity.
    pub fn qty(&self) -> u32 {
        self.qty
    }
}

impl PartialEq for OrderLine {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id
    }
}

impl Eq for OrderLine {}

impl Hash for OrderLine {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_id.hash(state);
    }
}

impl PartialOrd for OrderLine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderLine {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_id.cmp(&other.order_id)
    }
}
