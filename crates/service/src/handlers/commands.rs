use async_trait::async_trait;
use domain::{Batch, Command, Product};
use product_store::StoreError;

use super::unexpected_command;
use crate::error::{Result, ServiceError};
use crate::message_bus::{CommandHandler, CommandOutput, Handled};
use crate::unit_of_work::UnitOfWork;

/// Allocates an order line to a batch of an existing product.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allocate;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for Allocate {
    fn name(&self) -> &'static str {
        "allocate"
    }

    #[tracing::instrument(name = "allocate", skip_all)]
    async fn handle(&self, command: Command, uow: &U) -> Result<Handled> {
        let command = match command {
            Command::Allocate(command) => command,
            other => return Err(unexpected_command(CommandHandler::<U>::name(self), &other)),
        };

        let mut scope = uow.begin().await?;
        let product = scope
            .products()
            .get(&command.sku)
            .await?
            .ok_or_else(|| ServiceError::InvalidSku(command.sku.clone()))?;

        let outcome = product.allocate(command.line());
        scope.commit().await?;

        let output = match outcome.batch_reference() {
            Some(reference) => {
                tracing::info!(order_id = %command.order_id, batch = %reference, "Order line allocated");
                metrics::counter!("allocations_total").increment(1);
                CommandOutput::Allocated(reference.clone())
            }
            None => CommandOutput::Empty,
        };

        Ok(Handled::new(output, scope.collect_new_events().await?))
    }
}

/// Releases one allocated line of a product.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deallocate;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for Deallocate {
    fn name(&self) -> &'static str {
        "deallocate"
    }

    #[tracing::instrument(name = "deallocate", skip_all)]
    async fn handle(&self, command: Command, uow: &U) -> Result<Handled> {
        let command = match command {
            Command::Deallocate(command) => command,
            other => return Err(unexpected_command(CommandHandler::<U>::name(self), &other)),
        };

        let mut scope = uow.begin().await?;
        let product = scope
            .products()
            .get(&command.sku)
            .await?
            .ok_or_else(|| ServiceError::InvalidSku(command.sku.clone()))?;

        let released = product.deallocate();
        scope.commit().await?;

        let output = match released {
            Some(line) => {
                tracing::info!(order_id = %line.order_id(), sku = %command.sku, "Order line deallocated");
                metrics::counter!("deallocations_total").increment(1);
                CommandOutput::Deallocated(line.order_id().clone())
            }
            None => CommandOutput::Empty,
        };

        Ok(Handled::new(output, scope.collect_new_events().await?))
    }
}

/// Adds a batch, creating its product on first sight of the sku.
///
/// Batch references are unique across all products.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddBatch;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for AddBatch {
    fn name(&self) -> &'static str {
        "add_batch"
    }

    #[tracing::instrument(name = "add_batch", skip_all)]
    async fn handle(&self, command: Command, uow: &U) -> Result<Handled> {
        let command = match command {
            Command::CreateBatch(command) => command,
            other => return Err(unexpected_command(CommandHandler::<U>::name(self), &other)),
        };

        let mut scope = uow.begin().await?;
        if scope
            .products()
            .get_by_batch_reference(&command.reference)
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateBatch(command.reference));
        }

        let sku = command.sku.clone();
        let product = scope
            .products()
            .get_or_add(&command.sku, || Product::new(sku, Vec::new()))
            .await?;

        product.add_batch(Batch::new(
            command.reference.clone(),
            command.sku.clone(),
            command.qty,
            command.eta,
        ));
        scope.commit().await.map_err(|err| match err {
            ServiceError::Store(StoreError::DuplicateBatch { reference }) => {
                ServiceError::DuplicateBatch(reference)
            }
            other => other,
        })?;

        tracing::info!(batch = %command.reference, sku = %command.sku, qty = command.qty, "Batch added");
        Ok(Handled::new(
            CommandOutput::Empty,
            scope.collect_new_events().await?,
        ))
    }
}

/// Changes the purchased quantity of a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeBatchQuantity;

#[async_trait]
impl<U: UnitOfWork> CommandHandler<U> for ChangeBatchQuantity {
    fn name(&self) -> &'static str {
        "change_batch_quantity"
    }

    #[tracing::instrument(name = "change_batch_quantity", skip_all)]
    async fn handle(&self, command: Command, uow: &U) -> Result<Handled> {
        let command = match command {
            Command::ChangeBatchQuantity(command) => command,
            other => return Err(unexpected_command(CommandHandler::<U>::name(self), &other)),
        };

        let mut scope = uow.begin().await?;
        let product = scope
            .products()
            .get_by_batch_reference(&command.reference)
            .await?
            .ok_or_else(|| ServiceError::UnknownBatch(command.reference.clone()))?;

        product.change_batch_quantity(&command.reference, command.qty)?;
        scope.commit().await?;

        tracing::info!(batch = %command.reference, qty = command.qty, "Batch quantity changed");
        Ok(Handled::new(
            CommandOutput::Empty,
            scope.collect_new_events().await?,
        ))
    }
}
