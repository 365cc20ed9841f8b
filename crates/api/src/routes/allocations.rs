//! Allocation endpoints. Writes go through the message bus, reads through the views.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{BatchReference, OrderId, Sku};
use domain::{Allocate, ChangeBatchQuantity, CreateBatch, Deallocate, Message};
use serde::{Deserialize, Serialize};
use service::{AllocationView, CommandOutput, MessageBus, UnitOfWork, views};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<U: UnitOfWork> {
    pub bus: MessageBus<U>,
    pub uow: U,
}

impl<U: UnitOfWork> AppState<U> {
    /// Dispatches a command and returns what it produced.
    async fn dispatch(&self, message: impl Into<Message>) -> Result<CommandOutput, ApiError> {
        let outputs = self.bus.handle(message.into(), &self.uow).await?;
        outputs
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("command produced no result".to_string()))
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

#[derive(Deserialize)]
pub struct DeallocateRequest {
    pub sku: Sku,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    #[serde(rename = "ref")]
    pub reference: BatchReference,
    pub sku: Sku,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct ChangeQuantityRequest {
    #[serde(rename = "ref")]
    pub reference: BatchReference,
    pub qty: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct AllocatedResponse {
    pub batchref: Option<BatchReference>,
}

#[derive(Serialize)]
pub struct DeallocatedResponse {
    pub order_id: Option<OrderId>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

const OK: StatusResponse = StatusResponse { status: "ok" };

// -- Handlers --

/// POST /allocate. The body is `null` when nothing could be allocated.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id, sku = %req.sku))]
pub async fn allocate<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(req): Json<AllocateRequest>,
) -> Result<(StatusCode, Json<AllocatedResponse>), ApiError> {
    let output = state
        .dispatch(Allocate::new(req.order_id, req.sku, req.qty))
        .await?;
    let batchref = match output {
        CommandOutput::Allocated(reference) => Some(reference),
        _ => None,
    };
    Ok((StatusCode::ACCEPTED, Json(AllocatedResponse { batchref })))
}

/// POST /deallocate frees one line from the latest-sorting batch that has
/// allocations, the one with the greatest order id.
#[tracing::instrument(skip(state, req), fields(sku = %req.sku))]
pub async fn deallocate<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(req): Json<DeallocateRequest>,
) -> Result<Json<DeallocatedResponse>, ApiError> {
    let output = state.dispatch(Deallocate::new(req.sku)).await?;
    let order_id = match output {
        CommandOutput::Deallocated(order_id) => Some(order_id),
        _ => None,
    };
    Ok(Json(DeallocatedResponse { order_id }))
}

/// POST /batch
#[tracing::instrument(skip(state, req), fields(reference = %req.reference, sku = %req.sku))]
pub async fn add_batch<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(req): Json<BatchRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    state
        .dispatch(CreateBatch::new(req.reference, req.sku, req.qty, req.eta))
        .await?;
    Ok((StatusCode::CREATED, Json(OK)))
}

/// POST /change_quantity
#[tracing::instrument(skip(state, req), fields(reference = %req.reference))]
pub async fn change_quantity<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Json(req): Json<ChangeQuantityRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .dispatch(ChangeBatchQuantity::new(req.reference, req.qty))
        .await?;
    Ok(Json(OK))
}

/// GET /allocations
#[tracing::instrument(skip(state))]
pub async fn list<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
) -> Result<Json<Vec<AllocationView>>, ApiError> {
    Ok(Json(views::all_allocations(&state.uow).await?))
}

/// GET /allocations/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get<U: UnitOfWork>(
    State(state): State<Arc<AppState<U>>>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<AllocationView>>, ApiError> {
    let found = views::allocations(&OrderId::new(order_id.as_str()), &state.uow).await?;
    if found.is_empty() {
        return Err(ApiError::NotFound(format!("No allocations for order {order_id}")));
    }
    Ok(Json(found))
}
