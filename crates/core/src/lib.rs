//! `austin-core`: identifiers, errors, paging and audit primitives shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use audit::{AuditStamp, Auditable};
pub use entity::{Entity, same_identity};
pub use error::{DomainError, DomainResult};
pub use id::{MemberId, TodoId};
pub use page::{Page, PageRequest};
