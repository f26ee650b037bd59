//! In-memory stores for tests and local development.
//!
//! All tables live behind one `RwLock`. A read holds the lock for the bare
//! fetch and its hydration, so both observe the same state.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::{debug, instrument};

use austin_core::{DomainError, MemberId, Page, PageRequest, TodoId};
use austin_todos::{Authority, Memberships, OneGridUser, Todo};

use crate::error::{StoreError, StoreResult};
use crate::hydration::{FetchJoin, TodoMemberRow, hydrate_list, hydrate_one, hydrate_page};
use crate::repository::{AuthorityRepository, LoadMode, MemberLinks, MemberRepository, TodoRepository};

#[derive(Debug)]
struct Tables {
    todos: BTreeMap<TodoId, Todo>,
    members: BTreeMap<MemberId, OneGridUser>,
    memberships: Memberships,
    authorities: BTreeMap<String, Authority>,
    next_todo_id: i64,
    next_member_id: i64,
}

impl Default for Tables {
    fn default() -> Self {
        let authorities = ["ROLE_ADMIN", "ROLE_USER"]
            .into_iter()
            .map(|name| (name.to_string(), Authority { name: name.to_string() }))
            .collect();
        Self {
            todos: BTreeMap::new(),
            members: BTreeMap::new(),
            memberships: Memberships::new(),
            authorities,
            next_todo_id: 1,
            next_member_id: 1,
        }
    }
}

impl Tables {
    fn member_with_inverse(&self, user: &OneGridUser) -> OneGridUser {
        let mut user = user.clone();
        if let Some(id) = user.id {
            user.todos = self.memberships.owners_of(id).into_iter().collect();
        }
        user
    }
}

/// Read-only view of the tables for the duration of one locked read.
struct MemorySession<'a> {
    tables: &'a Tables,
}

#[async_trait::async_trait]
impl FetchJoin for MemorySession<'_> {
    async fn fetch_join_rows(&mut self, ids: &[TodoId]) -> StoreResult<Vec<TodoMemberRow>> {
        let mut rows = Vec::new();
        for id in ids {
            let Some(todo) = self.tables.todos.get(id) else {
                continue;
            };
            let members = self.tables.memberships.members_of(*id);
            if members.is_empty() {
                rows.push(TodoMemberRow { todo: todo.clone(), member: None });
                continue;
            }
            for member_id in members {
                rows.push(TodoMemberRow {
                    todo: todo.clone(),
                    member: self.tables.members.get(&member_id).cloned(),
                });
            }
        }
        Ok(rows)
    }
}

/// In-memory implementation of every repository.
///
/// Seeded with the `ROLE_ADMIN` and `ROLE_USER` authorities.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TodoRepository for InMemoryStore {
    #[instrument(skip(self, todo), fields(todo_id = ?todo.id), err)]
    async fn save(&self, todo: Todo, links: MemberLinks) -> StoreResult<Todo> {
        todo.validate()?;
        let mut tables = self.tables.write().await;

        let id = match todo.id {
            Some(id) if tables.todos.contains_key(&id) => id,
            Some(_) => return Err(DomainError::not_found().into()),
            None => {
                let id = TodoId::new(tables.next_todo_id);
                tables.next_todo_id += 1;
                id
            }
        };

        if links == MemberLinks::Replace {
            let member_ids = todo.member_ids();
            if let Some(missing) = member_ids.iter().find(|m| !tables.members.contains_key(*m)) {
                return Err(StoreError::InvalidReference(format!("unknown user id {missing}")));
            }
            tables.memberships.replace_members(id, member_ids);
        }

        let stored = todo.without_users().with_id(id);
        tables.todos.insert(id, stored.clone());
        debug!(todo_id = %id, "stored todo");
        Ok(stored)
    }

    async fn exists_by_id(&self, id: TodoId) -> StoreResult<bool> {
        Ok(self.tables.read().await.todos.contains_key(&id))
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, id: TodoId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let unlinked = tables.memberships.remove_owner(id);
        let removed = tables.todos.remove(&id).is_some();
        debug!(todo_id = %id, removed, unlinked, "deleted todo");
        Ok(removed)
    }

    #[instrument(skip(self), err)]
    async fn find_by_id(&self, id: TodoId, mode: LoadMode) -> StoreResult<Option<Todo>> {
        let tables = self.tables.read().await;
        let todo = tables.todos.get(&id).cloned();
        match mode {
            LoadMode::Bare => Ok(todo),
            LoadMode::Hydrated => hydrate_one(&mut MemorySession { tables: &tables }, todo).await,
        }
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self, mode: LoadMode) -> StoreResult<Vec<Todo>> {
        let tables = self.tables.read().await;
        let todos: Vec<Todo> = tables.todos.values().cloned().collect();
        match mode {
            LoadMode::Bare => Ok(todos),
            LoadMode::Hydrated => hydrate_list(&mut MemorySession { tables: &tables }, todos).await,
        }
    }

    #[instrument(skip(self), err)]
    async fn find_page(&self, request: PageRequest, mode: LoadMode) -> StoreResult<Page<Todo>> {
        let tables = self.tables.read().await;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let content: Vec<Todo> = tables
            .todos
            .values()
            .skip(offset)
            .take(request.size() as usize)
            .cloned()
            .collect();
        let page = Page::new(content, request, tables.todos.len() as u64);
        match mode {
            LoadMode::Bare => Ok(page),
            LoadMode::Hydrated => hydrate_page(&mut MemorySession { tables: &tables }, page).await,
        }
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.tables.read().await.todos.len() as u64)
    }
}

#[async_trait::async_trait]
impl MemberRepository for InMemoryStore {
    #[instrument(skip(self, user), fields(member_id = ?user.id), err)]
    async fn save(&self, user: OneGridUser) -> StoreResult<OneGridUser> {
        user.validate()?;
        let mut tables = self.tables.write().await;

        let id = match user.id {
            Some(id) if tables.members.contains_key(&id) => id,
            Some(_) => return Err(DomainError::not_found().into()),
            None => {
                let id = MemberId::new(tables.next_member_id);
                tables.next_member_id += 1;
                id
            }
        };

        let mut stored = user.with_id(id);
        stored.todos.clear();
        tables.members.insert(id, stored);
        Ok(tables.member_with_inverse(&tables.members[&id]))
    }

    async fn find_by_id(&self, id: MemberId) -> StoreResult<Option<OneGridUser>> {
        let tables = self.tables.read().await;
        Ok(tables.members.get(&id).map(|u| tables.member_with_inverse(u)))
    }

    async fn find_all_by_ids(&self, ids: &[MemberId]) -> StoreResult<Vec<OneGridUser>> {
        let tables = self.tables.read().await;
        ids.iter()
            .map(|id| {
                tables
                    .members
                    .get(id)
                    .map(|u| tables.member_with_inverse(u))
                    .ok_or_else(|| StoreError::InvalidReference(format!("unknown user id {id}")))
            })
            .collect()
    }

    async fn find_all(&self) -> StoreResult<Vec<OneGridUser>> {
        let tables = self.tables.read().await;
        Ok(tables.members.values().map(|u| tables.member_with_inverse(u)).collect())
    }

    async fn exists_by_id(&self, id: MemberId) -> StoreResult<bool> {
        Ok(self.tables.read().await.members.contains_key(&id))
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, id: MemberId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        tables.memberships.remove_member(id);
        Ok(tables.members.remove(&id).is_some())
    }
}

#[async_trait::async_trait]
impl AuthorityRepository for InMemoryStore {
    async fn save(&self, authority: Authority) -> StoreResult<Authority> {
        let mut tables = self.tables.write().await;
        tables.authorities.insert(authority.name.clone(), authority.clone());
        Ok(authority)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Authority>> {
        Ok(self.tables.read().await.authorities.get(name).cloned())
    }

    async fn find_all(&self) -> StoreResult<Vec<Authority>> {
        Ok(self.tables.read().await.authorities.values().cloned().collect())
    }

    async fn delete_by_name(&self, name: &str) -> StoreResult<bool> {
        Ok(self.tables.write().await.authorities.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(store: &InMemoryStore, email: &str) -> OneGridUser {
        MemberRepository::save(store, OneGridUser::new(email)).await.unwrap()
    }

    async fn todo_with(store: &InMemoryStore, task: &str, users: &[&OneGridUser]) -> Todo {
        let mut todo = Todo::new(task, "09:00");
        for u in users {
            todo.insert_user((*u).clone());
        }
        TodoRepository::save(store, todo, MemberLinks::Replace).await.unwrap()
    }

    fn ids(todo: &Todo) -> Vec<i64> {
        todo.member_ids().into_iter().map(i64::from).collect()
    }

    #[tokio::test]
    async fn save_assigns_ids_and_returns_bare_todo() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;

        let saved = todo_with(&store, "write report", &[&u]).await;

        assert_eq!(saved.id, Some(TodoId::new(1)));
        assert!(saved.users.is_empty());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bare_and_hydrated_reads_differ_only_in_users() {
        let store = InMemoryStore::new();
        let u10 = user(&store, "a@example.com").await;
        let u11 = user(&store, "b@example.com").await;
        let saved = todo_with(&store, "t", &[&u11, &u10]).await;
        let id = saved.id.unwrap();

        let bare = TodoRepository::find_by_id(&store, id, LoadMode::Bare).await.unwrap().unwrap();
        let hydrated = store.find_one_with_eager_relationships(id).await.unwrap().unwrap();

        assert!(bare.users.is_empty());
        assert_eq!(ids(&hydrated), vec![1, 2]);
        assert_eq!(hydrated.task, bare.task);
    }

    #[tokio::test]
    async fn missing_todo_is_absent_not_an_error() {
        let store = InMemoryStore::new();
        let found = store.find_one_with_eager_relationships(TodoId::new(42)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn hydrated_list_keeps_id_order() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;
        todo_with(&store, "one", &[&u]).await;
        todo_with(&store, "two", &[]).await;
        todo_with(&store, "three", &[&u]).await;

        let all = store.find_all_with_eager_relationships().await.unwrap();

        let tasks: Vec<_> = all.iter().map(|t| t.task.as_str()).collect();
        assert_eq!(tasks, vec!["one", "two", "three"]);
        assert_eq!(ids(&all[0]), vec![1]);
        assert!(all[1].users.is_empty());
    }

    #[tokio::test]
    async fn hydrated_page_keeps_metadata() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;
        for i in 0..5 {
            todo_with(&store, &format!("task {i}"), &[&u]).await;
        }

        let page = store
            .find_all_with_eager_relationships_paged(PageRequest::new(1, 2).unwrap())
            .await
            .unwrap();

        assert_eq!(page.number(), 1);
        assert_eq!(page.size(), 2);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.content().len(), 2);
        assert_eq!(page.content()[0].task, "task 2");
        assert!(page.content().iter().all(|t| ids(t) == vec![1]));
    }

    #[tokio::test]
    async fn keep_links_leaves_assignments_alone() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;
        let mut saved = todo_with(&store, "t", &[&u]).await;

        saved.task = "renamed".into();
        TodoRepository::save(&store, saved.clone(), MemberLinks::Keep).await.unwrap();

        let hydrated = TodoRepository::find_by_id(&store, saved.id.unwrap(), LoadMode::Hydrated)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hydrated.task, "renamed");
        assert_eq!(ids(&hydrated), vec![1]);
    }

    #[tokio::test]
    async fn unknown_member_reference_is_rejected() {
        let store = InMemoryStore::new();
        let mut todo = Todo::new("t", "09:00");
        todo.insert_user(OneGridUser::new("ghost@example.com").with_id(MemberId::new(99)));

        let err = TodoRepository::save(&store, todo, MemberLinks::Replace).await.unwrap_err();

        assert!(matches!(err, StoreError::InvalidReference(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_one_todo_leaves_the_other_intact() {
        let store = InMemoryStore::new();
        let shared = user(&store, "shared@example.com").await;
        let first = todo_with(&store, "first", &[&shared]).await;
        let second = todo_with(&store, "second", &[&shared]).await;

        assert!(TodoRepository::delete_by_id(&store, first.id.unwrap()).await.unwrap());

        let remaining = store
            .find_one_with_eager_relationships(second.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&remaining), vec![1]);
        let member = MemberRepository::find_by_id(&store, MemberId::new(1)).await.unwrap().unwrap();
        assert_eq!(member.todos.len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_member_unassigns_it() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;
        let saved = todo_with(&store, "t", &[&u]).await;

        assert!(MemberRepository::delete_by_id(&store, u.id.unwrap()).await.unwrap());

        let hydrated = store.find_one_with_eager_relationships(saved.id.unwrap()).await.unwrap().unwrap();
        assert!(hydrated.users.is_empty());
    }

    #[tokio::test]
    async fn find_all_by_ids_reports_unknown_ids() {
        let store = InMemoryStore::new();
        let u = user(&store, "a@example.com").await;

        let found = store.find_all_by_ids(&[u.id.unwrap()]).await.unwrap();
        assert_eq!(found.len(), 1);

        let err = store.find_all_by_ids(&[u.id.unwrap(), MemberId::new(7)]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn authorities_are_seeded_and_keyed_by_name() {
        let store = InMemoryStore::new();
        assert!(store.find_by_name("ROLE_ADMIN").await.unwrap().is_some());

        AuthorityRepository::save(&store, Authority::new("ROLE_AUDITOR").unwrap()).await.unwrap();
        assert_eq!(AuthorityRepository::find_all(&store).await.unwrap().len(), 3);
        assert!(store.delete_by_name("ROLE_AUDITOR").await.unwrap());
        assert!(!store.delete_by_name("ROLE_AUDITOR").await.unwrap());
    }
}
