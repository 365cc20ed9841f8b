//! Allocation commands.

use chrono::NaiveDate;
use common::{BatchReference, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::message::Message;

use super::OrderLine;

/// Requests handled by exactly one command handler each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    Allocate(Allocate),
    Deallocate(Deallocate),
    CreateBatch(CreateBatch),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

/// Closed tag for each command type, used as the handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    Allocate,
    Deallocate,
    CreateBatch,
    ChangeBatchQuantity,
}

impl CommandKind {
    /// Every command kind.
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Allocate,
        CommandKind::Deallocate,
        CommandKind::CreateBatch,
        CommandKind::ChangeBatchQuantity,
    ];

    /// Returns the command type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Allocate => "Allocate",
            CommandKind::Deallocate => "Deallocate",
            CommandKind::CreateBatch => "CreateBatch",
            CommandKind::ChangeBatchQuantity => "ChangeBatchQuantity",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Command {
    /// Returns the closed tag for this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Allocate(_) => CommandKind::Allocate,
            Command::Deallocate(_) => CommandKind::Deallocate,
            Command::CreateBatch(_) => CommandKind::CreateBatch,
            Command::ChangeBatchQuantity(_) => CommandKind::ChangeBatchQuantity,
        }
    }
}

/// Command to allocate an order line to the best batch of its sku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

impl Allocate {
    /// Creates a new Allocate command.
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }
    }

    /// Returns the order line this command asks to allocate.
    pub fn line(&self) -> OrderLine {
        OrderLine::new(self.order_id.clone(), self.sku.clone(), self.qty)
    }
}

/// Command to release one allocated line of a sku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocate {
    pub sku: Sku,
}

impl Deallocate {
    /// Creates a new Deallocate command.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self { sku: sku.into() }
    }
}

/// Command to add a batch, creating the product on first sight of its sku.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub reference: BatchReference,
    pub sku: Sku,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

impl CreateBatch {
    /// Creates a new CreateBatch command.
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        qty: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            qty,
            eta,
        }
    }
}

/// Command to change the purchased quantity of an existing batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    pub reference: BatchReference,
    pub qty: u32,
}

impl ChangeBatchQuantity {
    /// Creates a new ChangeBatchQuantity command.
    pub fn new(reference: impl Into<BatchReference>, qty: u32) -> Self {
        Self {
            reference: reference.into(),
            qty,
        }
    }
}

macro_rules! into_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Command {
                fn from(command: $variant) -> Self {
                    Command::$variant(command)
                }
            }

            impl From<$variant> for Message {
                fn from(command: $variant) -> Self {
                    Message::Command(Command::$variant(command))
                }
            }
        )*
    };
}

into_command!(Allocate, Deallocate, CreateBatch, ChangeBatchQuantity);
