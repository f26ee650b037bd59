use axum::http::HeaderMap;
use thiserror::Error;

use austin_core::AuditStamp;

/// Header carrying the id of the acting user.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Who is performing the current request.
///
/// `actor() == None` is the system account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ActorContext {
    actor: Option<i64>,
}

impl ActorContext {
    pub fn new(actor: Option<i64>) -> Self {
        Self { actor }
    }

    pub fn system() -> Self {
        Self::default()
    }

    pub fn actor(&self) -> Option<i64> {
        self.actor
    }

    /// Audit stamp for a write performed now by this actor.
    pub fn stamp(&self) -> AuditStamp {
        AuditStamp::now(self.actor)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid actor id: {0}")]
pub struct ActorError(pub String);

/// Resolves the acting user from request headers.
pub trait ActorResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<ActorContext, ActorError>;
}

/// Reads the actor from `X-Actor-Id`. A missing or blank header means the
/// system account.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderActorResolver;

impl ActorResolver for HeaderActorResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<ActorContext, ActorError> {
        let Some(value) = headers.get(ACTOR_HEADER) else {
            return Ok(ActorContext::system());
        };
        let value = value
            .to_str()
            .map_err(|_| ActorError("header is not valid text".to_string()))?
            .trim();
        if value.is_empty() {
            return Ok(ActorContext::system());
        }
        value
            .parse::<i64>()
            .map(|id| ActorContext::new(Some(id)))
            .map_err(|_| ActorError(value.to_string()))
    }
}
