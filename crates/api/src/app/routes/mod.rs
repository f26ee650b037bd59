use axum::Router;

pub mod authorities;
pub mod common;
pub mod members;
pub mod system;
pub mod todos;

/// Router for the `/api` resources.
pub fn router() -> Router {
    Router::new()
        .nest("/todos", todos::router())
        .nest("/one-grid-users", members::router())
        .nest("/authorities", authorities::router())
}
