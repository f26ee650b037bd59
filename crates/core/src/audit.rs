//! Explicit audit stamping for write paths.
//!
//! The write path builds an [`AuditStamp`] from whatever actor the caller
//! resolved (usually from the request) and applies it before persisting.

use chrono::{DateTime, Utc};

/// Who performed a write and when.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    /// Acting user id; `None` is the system account.
    pub actor: Option<i64>,
    pub at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: Option<i64>, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }

    pub fn system(at: DateTime<Utc>) -> Self {
        Self { actor: None, at }
    }

    pub fn now(actor: Option<i64>) -> Self {
        Self::new(actor, Utc::now())
    }
}

/// Entities carrying created/last-modified audit columns.
pub trait Auditable {
    /// Stamp a new entity. Creation columns already supplied by the client are kept.
    fn stamp_created(&mut self, stamp: AuditStamp);

    /// Stamp an update of an existing entity.
    fn stamp_modified(&mut self, stamp: AuditStamp);
}
