//! Eager hydration of the todo → users association.
//!
//! Loading todos and their users in the same statement as other collections
//! multiplies rows (one per owner × member × …). Owners are therefore always
//! loaded bare first, then this module issues a single follow-up fetch join
//! scoped to the owners already in hand and folds the rows back onto them.
//!
//! The follow-up query never asks the database for `DISTINCT`; rows are
//! collapsed on owner identity after they are materialised (`collapse_rows`).
//! Every function here is read-only and runs on whatever session the caller
//! passes in, so the bare load and the hydration share one transaction.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use austin_core::{Page, TodoId};
use austin_todos::{OneGridUser, Todo};

use crate::error::StoreResult;

/// One row of `todo LEFT JOIN rel_todo__users LEFT JOIN one_grid_user`.
///
/// `member` is `None` for a todo without users.
#[derive(Debug, Clone)]
pub struct TodoMemberRow {
    pub todo: Todo,
    pub member: Option<OneGridUser>,
}

/// A session able to run the hydration fetch join.
#[async_trait]
pub trait FetchJoin: Send {
    /// Select the todos with the given ids, left-joined with their users.
    ///
    /// Rows may come back in any order and may repeat a (todo, user) pair.
    /// Ids with no matching todo produce no rows.
    async fn fetch_join_rows(&mut self, ids: &[TodoId]) -> StoreResult<Vec<TodoMemberRow>>;
}

/// Collapse fetch-join rows onto their owners.
///
/// Owners come out in order of first appearance, each with a duplicate-free
/// user set.
pub fn collapse_rows(rows: Vec<TodoMemberRow>) -> Vec<Todo> {
    let mut owners: Vec<Todo> = Vec::new();
    let mut index: HashMap<TodoId, usize> = HashMap::new();

    for row in rows {
        let Some(id) = row.todo.id else {
            continue;
        };
        let slot = *index.entry(id).or_insert_with(|| {
            owners.push(row.todo.without_users());
            owners.len() - 1
        });
        if let Some(member) = row.member {
            owners[slot].insert_user(member);
        }
    }

    owners
}

/// Hydrate a single optional todo.
///
/// An absent todo stays absent and issues no query. A todo whose row has
/// disappeared since it was loaded hydrates to `None`.
pub async fn hydrate_one<F>(session: &mut F, todo: Option<Todo>) -> StoreResult<Option<Todo>>
where
    F: FetchJoin + ?Sized,
{
    let Some(todo) = todo else {
        return Ok(None);
    };
    let Some(id) = todo.id else {
        return Ok(Some(todo));
    };

    let rows = session.fetch_join_rows(&[id]).await?;
    let hydrated = collapse_rows(rows).into_iter().find(|t| t.id == Some(id));
    debug!(todo_id = %id, found = hydrated.is_some(), "hydrated todo users");
    Ok(hydrated)
}

/// Hydrate a list of todos, keeping the input order.
///
/// Empty input issues no query. Todos that can no longer be found are
/// omitted, and a todo listed twice is returned once.
pub async fn hydrate_list<F>(session: &mut F, todos: Vec<Todo>) -> StoreResult<Vec<Todo>>
where
    F: FetchJoin + ?Sized,
{
    let mut seen = HashSet::new();
    let ids: Vec<TodoId> = todos
        .iter()
        .filter_map(|t| t.id)
        .filter(|id| seen.insert(*id))
        .collect();
    if ids.is_empty() {
        return Ok(todos);
    }

    let rows = session.fetch_join_rows(&ids).await?;
    let mut by_id: HashMap<TodoId, Todo> = collapse_rows(rows)
        .into_iter()
        .filter_map(|t| t.id.map(|id| (id, t)))
        .collect();

    let requested = ids.len();
    let mut hydrated = Vec::with_capacity(todos.len());
    for todo in todos {
        match todo.id {
            Some(id) => {
                if let Some(found) = by_id.remove(&id) {
                    hydrated.push(found);
                }
            }
            None => hydrated.push(todo),
        }
    }

    debug!(requested, returned = hydrated.len(), "hydrated todo list users");
    Ok(hydrated)
}

/// Hydrate a page of todos. Page number, size and total count are carried
/// over untouched; the count query is not re-run.
pub async fn hydrate_page<F>(session: &mut F, page: Page<Todo>) -> StoreResult<Page<Todo>>
where
    F: FetchJoin + ?Sized,
{
    let (content, request, total_elements) = page.into_parts();
    let hydrated = hydrate_list(session, content).await?;
    Ok(Page::new(hydrated, request, total_elements))
}
