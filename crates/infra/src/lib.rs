//! Infrastructure layer: repositories, collection hydration, stores and config.

pub mod config;
pub mod error;
pub mod hydration;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use config::{AppConfig, ConfigError, StoreBackend};
pub use error::{StoreError, StoreResult};
pub use hydration::{FetchJoin, TodoMemberRow, collapse_rows, hydrate_list, hydrate_one, hydrate_page};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{AuthorityRepository, LoadMode, MemberLinks, MemberRepository, TodoRepository};
