//! Repository abstractions over the todo, user and authority tables.
//!
//! Whether a todo read hydrates its users is an explicit [`LoadMode`]
//! argument rather than a separate query method per shape.

use austin_core::{MemberId, Page, PageRequest, TodoId};
use austin_todos::{Authority, OneGridUser, Todo};

use crate::error::StoreResult;

/// How much of a todo a read loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Scalar columns only; `users` is left empty.
    #[default]
    Bare,
    /// Scalar columns plus the full, duplicate-free user set.
    Hydrated,
}

impl LoadMode {
    pub fn from_eager(eager: bool) -> Self {
        if eager { Self::Hydrated } else { Self::Bare }
    }
}

/// What `TodoRepository::save` does with the todo's join rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberLinks {
    /// Leave the stored assignments untouched.
    Keep,
    /// Replace the stored assignments with `todo.member_ids()`.
    Replace,
}

#[async_trait::async_trait]
pub trait TodoRepository: Send + Sync {
    /// Insert (no id) or update (id present) a todo. Returns the stored row, bare.
    async fn save(&self, todo: Todo, links: MemberLinks) -> StoreResult<Todo>;

    async fn exists_by_id(&self, id: TodoId) -> StoreResult<bool>;

    /// Delete a todo and its join rows. Returns whether a row was removed.
    async fn delete_by_id(&self, id: TodoId) -> StoreResult<bool>;

    async fn find_by_id(&self, id: TodoId, mode: LoadMode) -> StoreResult<Option<Todo>>;

    /// All todos ordered by id.
    async fn find_all(&self, mode: LoadMode) -> StoreResult<Vec<Todo>>;

    /// One page of todos ordered by id.
    async fn find_page(&self, request: PageRequest, mode: LoadMode) -> StoreResult<Page<Todo>>;

    async fn count(&self) -> StoreResult<u64>;

    async fn find_one_with_eager_relationships(&self, id: TodoId) -> StoreResult<Option<Todo>> {
        self.find_by_id(id, LoadMode::Hydrated).await
    }

    async fn find_all_with_eager_relationships(&self) -> StoreResult<Vec<Todo>> {
        self.find_all(LoadMode::Hydrated).await
    }

    async fn find_all_with_eager_relationships_paged(
        &self,
        request: PageRequest,
    ) -> StoreResult<Page<Todo>> {
        self.find_page(request, LoadMode::Hydrated).await
    }
}

#[async_trait::async_trait]
pub trait MemberRepository: Send + Sync {
    async fn save(&self, user: OneGridUser) -> StoreResult<OneGridUser>;

    async fn find_by_id(&self, id: MemberId) -> StoreResult<Option<OneGridUser>>;

    /// Load the users with the given ids, failing with
    /// `StoreError::InvalidReference` if any id is unknown.
    async fn find_all_by_ids(&self, ids: &[MemberId]) -> StoreResult<Vec<OneGridUser>>;

    async fn find_all(&self) -> StoreResult<Vec<OneGridUser>>;

    async fn exists_by_id(&self, id: MemberId) -> StoreResult<bool>;

    /// Delete a user and unassign it from every todo.
    async fn delete_by_id(&self, id: MemberId) -> StoreResult<bool>;
}

#[async_trait::async_trait]
pub trait AuthorityRepository: Send + Sync {
    async fn save(&self, authority: Authority) -> StoreResult<Authority>;

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Authority>>;

    async fn find_all(&self) -> StoreResult<Vec<Authority>>;

    async fn delete_by_name(&self, name: &str) -> StoreResult<bool>;
}
