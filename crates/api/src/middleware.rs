use std::sync::Arc;

use axum::{extract::State, http::StatusCode, middleware::Next, response::Response};

use crate::app::errors;
use crate::context::ActorResolver;

#[derive(Clone)]
pub struct ActorState {
    pub resolver: Arc<dyn ActorResolver>,
}

/// Resolve the acting user and attach it to the request as an `ActorContext`.
pub async fn actor_middleware(
    State(state): State<ActorState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let actor = match state.resolver.resolve(req.headers()) {
        Ok(actor) => actor,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_actor", e.to_string()),
    };

    req.extensions_mut().insert(actor);
    next.run(req).await
}
