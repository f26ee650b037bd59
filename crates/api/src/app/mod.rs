//! HTTP application wiring (Axum router + services).
//!
//! - `services.rs`: repository wiring for the configured backend
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, query and path parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::context::{ActorResolver, HeaderActorResolver};
use crate::middleware::{self, ActorState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router with the default `X-Actor-Id` resolver.
pub fn build_app(services: AppServices) -> Router {
    build_app_with_resolver(services, Arc::new(HeaderActorResolver))
}

pub fn build_app_with_resolver(services: AppServices, resolver: Arc<dyn ActorResolver>) -> Router {
    let actor_state = ActorState { resolver };

    let api = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(Arc::new(services)))
            .layer(axum::middleware::from_fn_with_state(
                actor_state,
                middleware::actor_middleware,
            )),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
}
