use std::sync::Arc;

use tracing::info;

use austin_core::MemberId;
use austin_infra::{
    AppConfig, AuthorityRepository, InMemoryStore, MemberRepository, PostgresStore, StoreBackend,
    StoreResult, TodoRepository,
};
use austin_todos::OneGridUser;

/// Page size limits for list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub default_size: u32,
    pub max_size: u32,
}

/// Repositories and settings shared by every handler.
pub struct AppServices {
    pub todos: Arc<dyn TodoRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub authorities: Arc<dyn AuthorityRepository>,
    pub paging: Paging,
    pub app_name: String,
}

impl AppServices {
    /// Wire all repositories to one store.
    pub fn with_store<S>(store: Arc<S>, config: &AppConfig) -> Self
    where
        S: TodoRepository + MemberRepository + AuthorityRepository + 'static,
    {
        Self {
            todos: store.clone(),
            members: store.clone(),
            authorities: store,
            paging: Paging {
                default_size: config.default_page_size,
                max_size: config.max_page_size,
            },
            app_name: config.app_name.clone(),
        }
    }

    pub fn in_memory(config: &AppConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }

    /// Load the referenced users, in id order, failing on any unknown id.
    pub async fn resolve_members(&self, ids: &[MemberId]) -> StoreResult<Vec<OneGridUser>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        self.members.find_all_by_ids(&ids).await
    }
}

/// Build services for the configured backend.
pub async fn build_services(config: &AppConfig) -> StoreResult<AppServices> {
    match &config.backend {
        StoreBackend::InMemory => {
            info!("using in-memory stores");
            Ok(AppServices::in_memory(config))
        }
        StoreBackend::Postgres { database_url } => {
            info!("using postgres stores");
            let store = PostgresStore::connect(database_url).await?;
            store.ensure_schema().await?;
            Ok(AppServices::with_store(Arc::new(store), config))
        }
    }
}
