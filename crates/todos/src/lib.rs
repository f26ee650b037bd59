//! Todo domain: todos, the users assigned to them, and authorities.

pub mod authority;
pub mod member;
pub mod membership;
pub mod todo;

pub use authority::Authority;
pub use member::{Group, MemberPatch, OneGridUser};
pub use membership::Memberships;
pub use todo::{Todo, TodoPatch};
