//! HTTP API server with observability for the allocation service.
//!
//! Provides REST endpoints for batches and allocations on top of the
//! service message bus, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use product_store::ProductStore;
use service::{
    BusConfigError, EventPublisher, LoggingNotifications, LoggingPublisher, Notifications,
    StoreUnitOfWork, UnitOfWork, bootstrap,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::allocations::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<U: UnitOfWork>(state: Arc<AppState<U>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::health::status))
        .route("/health", get(routes::health::check))
        .route("/allocate", post(routes::allocations::allocate::<U>))
        .route("/deallocate", post(routes::allocations::deallocate::<U>))
        .route("/batch", post(routes::allocations::add_batch::<U>))
        .route("/change_quantity", post(routes::allocations::change_quantity::<U>))
        .route("/allocations", get(routes::allocations::list::<U>))
        .route("/allocations/{order_id}", get(routes::allocations::get::<U>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state around a unit of work with the given collaborators.
pub fn create_state<U, P, N>(
    uow: U,
    publisher: P,
    notifications: N,
) -> Result<Arc<AppState<U>>, BusConfigError>
where
    U: UnitOfWork,
    P: EventPublisher + 'static,
    N: Notifications + 'static,
{
    let bus = bootstrap::message_bus(publisher, notifications)?;
    Ok(Arc::new(AppState { bus, uow }))
}

/// Creates the default application state over a product store, publishing
/// events and notifications to the log.
pub fn create_default_state<S: ProductStore>(
    store: S,
) -> Result<Arc<AppState<StoreUnitOfWork<S>>>, BusConfigError> {
    create_state(
        StoreUnitOfWork::new(store),
        LoggingPublisher,
        LoggingNotifications,
    )
}

