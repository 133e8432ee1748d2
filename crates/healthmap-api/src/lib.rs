//! JSON HTTP surface for the healthmap directory.
//!
//! Exposes an axum [`Router`] backed by any
//! [`healthmap_core::store::FacilityStore`]. TLS and auth are the caller's
//! responsibility.

pub mod error;
pub mod units;

use axum::{Json, Router, routing::get};
use healthmap_core::{proximity::ProximityService, store::FacilityStore};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build the API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(service: ProximityService<S>) -> Router<()>
where
  S: FacilityStore + 'static,
{
  Router::new()
    .route("/", get(root))
    .route("/units/nearby", get(units::nearby::<S>))
    .route("/units/{cnes_id}", get(units::get_one::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

async fn root() -> Json<Value> {
  Json(json!({ "message": "Healthcare facility directory for Brazil" }))
}
