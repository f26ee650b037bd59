//! Postgres-backed repositories.
//!
//! Every public operation runs in its own transaction. Hydrated reads open a
//! `REPEATABLE READ, READ ONLY` transaction so the bare select and the
//! follow-up fetch join see one snapshot.
//!
//! ## Error Mapping
//!
//! | Postgres code | `StoreError` |
//! |---|---|
//! | `23505` unique violation | `Conflict` |
//! | `23503` foreign key violation | `InvalidReference` |
//! | anything else | `Database` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{Span, debug, instrument};

use austin_core::{DomainError, MemberId, Page, PageRequest, TodoId};
use austin_todos::{Authority, Group, OneGridUser, Todo};

use crate::error::{StoreError, StoreResult, map_sqlx_error};
use crate::hydration::{FetchJoin, TodoMemberRow, hydrate_list, hydrate_one, hydrate_page};
use crate::repository::{AuthorityRepository, LoadMode, MemberLinks, MemberRepository, TodoRepository};

const SCHEMA: &str = include_str!("../sql/schema.sql");

const TODO_COLUMNS: &str = "t.id, t.task, t.scheduled_time, t.valid_until, t.created_date, \
     t.last_modified_date, t.created_by, t.last_modified_by";

/// Postgres implementation of every repository.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect to `database_url` with a default pool.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet and seed the default authorities.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }

    /// Transaction for a read that may run a follow-up hydration query.
    async fn begin_snapshot(&self) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_transaction", e))?;
        Ok(tx)
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> StoreResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
}

struct TodoRow {
    id: i64,
    task: String,
    scheduled_time: String,
    valid_until: Option<DateTime<Utc>>,
    created_date: Option<DateTime<Utc>>,
    last_modified_date: Option<DateTime<Utc>>,
    created_by: Option<i64>,
    last_modified_by: Option<i64>,
}

impl<'r> FromRow<'r, PgRow> for TodoRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TodoRow {
            id: row.try_get("id")?,
            task: row.try_get("task")?,
            scheduled_time: row.try_get("scheduled_time")?,
            valid_until: row.try_get("valid_until")?,
            created_date: row.try_get("created_date")?,
            last_modified_date: row.try_get("last_modified_date")?,
            created_by: row.try_get("created_by")?,
            last_modified_by: row.try_get("last_modified_by")?,
        })
    }
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        let mut todo = Todo::new(row.task, row.scheduled_time).with_id(TodoId::new(row.id));
        todo.valid_until = row.valid_until;
        todo.created_date = row.created_date;
        todo.last_modified_date = row.last_modified_date;
        todo.created_by = row.created_by;
        todo.last_modified_by = row.last_modified_by;
        todo
    }
}

/// A user as selected on its own or through the fetch join (`user_` prefixed,
/// all nullable on the outer side of the join).
struct MemberRow {
    id: Option<i64>,
    email: Option<String>,
    date_of_birth: Option<DateTime<Utc>>,
    group: Option<String>,
}

impl MemberRow {
    fn read(row: &PgRow, prefix: &str) -> Result<Self, sqlx::Error> {
        Ok(MemberRow {
            id: row.try_get(format!("{prefix}id").as_str())?,
            email: row.try_get(format!("{prefix}email").as_str())?,
            date_of_birth: row.try_get(format!("{prefix}date_of_birth").as_str())?,
            group: row.try_get(format!("{prefix}group").as_str())?,
        })
    }

    /// `None` when the outer join matched no user.
    fn into_member(self) -> StoreResult<Option<OneGridUser>> {
        let (Some(id), Some(email)) = (self.id, self.email) else {
            return Ok(None);
        };
        let group = self
            .group
            .as_deref()
            .map(str::parse::<Group>)
            .transpose()
            .map_err(|e| StoreError::Decode(format!("one_grid_user {id}: {e}")))?;
        let mut user = OneGridUser::new(email).with_id(MemberId::new(id));
        user.date_of_birth = self.date_of_birth;
        user.group = group;
        Ok(Some(user))
    }
}

fn decode_todo(row: &PgRow) -> StoreResult<Todo> {
    TodoRow::from_row(row)
        .map(Todo::from)
        .map_err(|e| StoreError::Decode(format!("todo: {e}")))
}

fn decode_member(row: &PgRow) -> StoreResult<OneGridUser> {
    MemberRow::read(row, "")
        .map_err(|e| StoreError::Decode(format!("one_grid_user: {e}")))?
        .into_member()?
        .ok_or_else(|| StoreError::Decode("one_grid_user row without id".to_string()))
}

fn raw_ids<I: Into<i64> + Copy>(ids: &[I]) -> Vec<i64> {
    ids.iter().map(|id| (*id).into()).collect()
}

/// Plain LEFT JOIN of todos to their users; repeated rows are collapsed in memory.
fn fetch_join_sql() -> String {
    format!(
        r#"
        SELECT
            {TODO_COLUMNS},
            u.id AS user_id,
            u.email AS user_email,
            u.date_of_birth AS user_date_of_birth,
            u.jhi_group AS user_group
        FROM todo t
        LEFT JOIN rel_todo__users r ON r.todo_id = t.id
        LEFT JOIN one_grid_user u ON u.id = r.users_id
        WHERE t.id = ANY($1)
        "#
    )
}

#[async_trait::async_trait]
impl FetchJoin for PgConnection {
    #[instrument(
        skip(self, ids),
        fields(owners = ids.len(), operation = tracing::field::Empty),
        err
    )]
    async fn fetch_join_rows(&mut self, ids: &[TodoId]) -> StoreResult<Vec<TodoMemberRow>> {
        let span = Span::current();
        span.record("operation", "fetch_join_todo_users");

        let sql = fetch_join_sql();
        let rows = sqlx::query(&sql)
            .bind(raw_ids(ids))
            .fetch_all(&mut *self)
            .await
            .map_err(|e| map_sqlx_error("fetch_join_todo_users", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let member = MemberRow::read(row, "user_")
                .map_err(|e| StoreError::Decode(format!("joined one_grid_user: {e}")))?
                .into_member()?;
            out.push(TodoMemberRow { todo: decode_todo(row)?, member });
        }
        debug!(owners = ids.len(), rows = out.len(), "fetched todo users");
        Ok(out)
    }
}

async fn replace_links(conn: &mut PgConnection, id: TodoId, members: &[MemberId]) -> StoreResult<()> {
    sqlx::query("DELETE FROM rel_todo__users WHERE todo_id = $1")
        .bind(i64::from(id))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("unlink_todo_users", e))?;
    if members.is_empty() {
        return Ok(());
    }
    sqlx::query("INSERT INTO rel_todo__users (todo_id, users_id) SELECT $1, UNNEST($2::bigint[])")
        .bind(i64::from(id))
        .bind(raw_ids(members))
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("link_todo_users", e))?;
    Ok(())
}

#[async_trait::async_trait]
impl TodoRepository for PostgresStore {
    #[instrument(skip(self, todo), fields(todo_id = ?todo.id), err)]
    async fn save(&self, todo: Todo, links: MemberLinks) -> StoreResult<Todo> {
        todo.validate()?;
        let mut tx = self.begin().await?;

        let row = match todo.id {
            None => sqlx::query(&format!(
                "INSERT INTO todo AS t (task, scheduled_time, valid_until, created_date, \
                 last_modified_date, created_by, last_modified_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TODO_COLUMNS}"
            ))
            .bind(&todo.task)
            .bind(&todo.scheduled_time)
            .bind(todo.valid_until)
            .bind(todo.created_date)
            .bind(todo.last_modified_date)
            .bind(todo.created_by)
            .bind(todo.last_modified_by)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_todo", e))?,
            Some(id) => sqlx::query(&format!(
                "UPDATE todo AS t SET task = $2, scheduled_time = $3, valid_until = $4, \
                 created_date = $5, last_modified_date = $6, created_by = $7, \
                 last_modified_by = $8 WHERE t.id = $1 RETURNING {TODO_COLUMNS}"
            ))
            .bind(i64::from(id))
            .bind(&todo.task)
            .bind(&todo.scheduled_time)
            .bind(todo.valid_until)
            .bind(todo.created_date)
            .bind(todo.last_modified_date)
            .bind(todo.created_by)
            .bind(todo.last_modified_by)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_todo", e))?
            .ok_or(StoreError::Domain(DomainError::not_found()))?,
        };
        let stored = decode_todo(&row)?;

        if links == MemberLinks::Replace {
            if let Some(id) = stored.id {
                replace_links(&mut tx, id, &todo.member_ids()).await?;
            }
        }

        commit(tx).await?;
        Ok(stored)
    }

    async fn exists_by_id(&self, id: TodoId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM todo WHERE id = $1) AS present")
            .bind(i64::from(id))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_todo", e))?;
        row.try_get("present").map_err(|e| map_sqlx_error("exists_todo", e))
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, id: TodoId) -> StoreResult<bool> {
        let mut tx = self.begin().await?;
        replace_links(&mut tx, id, &[]).await?;
        let result = sqlx::query("DELETE FROM todo WHERE id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_todo", e))?;
        commit(tx).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn find_by_id(&self, id: TodoId, mode: LoadMode) -> StoreResult<Option<Todo>> {
        let mut tx = self.begin_snapshot().await?;
        let row = sqlx::query(&format!("SELECT {TODO_COLUMNS} FROM todo t WHERE t.id = $1"))
            .bind(i64::from(id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("find_todo", e))?;
        let todo = row.as_ref().map(decode_todo).transpose()?;
        let todo = match mode {
            LoadMode::Bare => todo,
            LoadMode::Hydrated => hydrate_one(&mut *tx, todo).await?,
        };
        commit(tx).await?;
        Ok(todo)
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self, mode: LoadMode) -> StoreResult<Vec<Todo>> {
        let mut tx = self.begin_snapshot().await?;
        let rows = sqlx::query(&format!("SELECT {TODO_COLUMNS} FROM todo t ORDER BY t.id"))
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("find_all_todos", e))?;
        let todos = rows.iter().map(decode_todo).collect::<StoreResult<Vec<_>>>()?;
        let todos = match mode {
            LoadMode::Bare => todos,
            LoadMode::Hydrated => hydrate_list(&mut *tx, todos).await?,
        };
        commit(tx).await?;
        Ok(todos)
    }

    #[instrument(skip(self), err)]
    async fn find_page(&self, request: PageRequest, mode: LoadMode) -> StoreResult<Page<Todo>> {
        let mut tx = self.begin_snapshot().await?;
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM todo")
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_todos", e))?;
        let rows = sqlx::query(&format!(
            "SELECT {TODO_COLUMNS} FROM todo t ORDER BY t.id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(request.size()))
        .bind(i64::try_from(request.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("find_todo_page", e))?;
        let content = rows.iter().map(decode_todo).collect::<StoreResult<Vec<_>>>()?;
        let page = Page::new(content, request, total.max(0) as u64);
        let page = match mode {
            LoadMode::Bare => page,
            LoadMode::Hydrated => hydrate_page(&mut *tx, page).await?,
        };
        commit(tx).await?;
        Ok(page)
    }

    async fn count(&self) -> StoreResult<u64> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM todo")
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_todos", e))?;
        Ok(total.max(0) as u64)
    }
}

const MEMBER_COLUMNS: &str = "id, email, date_of_birth, jhi_group AS \"group\"";

#[async_trait::async_trait]
impl MemberRepository for PostgresStore {
    #[instrument(skip(self, user), fields(member_id = ?user.id), err)]
    async fn save(&self, user: OneGridUser) -> StoreResult<OneGridUser> {
        user.validate()?;
        let mut tx = self.begin().await?;
        let group = user.group.map(|g| g.as_str());
        let row = match user.id {
            None => sqlx::query(&format!(
                "INSERT INTO one_grid_user (email, date_of_birth, jhi_group) \
                 VALUES ($1, $2, $3) RETURNING {MEMBER_COLUMNS}"
            ))
            .bind(&user.email)
            .bind(user.date_of_birth)
            .bind(group)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_one_grid_user", e))?,
            Some(id) => sqlx::query(&format!(
                "UPDATE one_grid_user SET email = $2, date_of_birth = $3, jhi_group = $4 \
                 WHERE id = $1 RETURNING {MEMBER_COLUMNS}"
            ))
            .bind(i64::from(id))
            .bind(&user.email)
            .bind(user.date_of_birth)
            .bind(group)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_one_grid_user", e))?
            .ok_or(StoreError::Domain(DomainError::not_found()))?,
        };
        let stored = decode_member(&row)?;
        commit(tx).await?;
        Ok(stored)
    }

    async fn find_by_id(&self, id: MemberId) -> StoreResult<Option<OneGridUser>> {
        let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM one_grid_user WHERE id = $1"))
            .bind(i64::from(id))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_one_grid_user", e))?;
        row.as_ref().map(decode_member).transpose()
    }

    async fn find_all_by_ids(&self, ids: &[MemberId]) -> StoreResult<Vec<OneGridUser>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM one_grid_user WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(raw_ids(ids))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_one_grid_users", e))?;
        let found = rows.iter().map(decode_member).collect::<StoreResult<Vec<_>>>()?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|u| u.id == Some(**id))) {
            return Err(StoreError::InvalidReference(format!("unknown user id {missing}")));
        }
        Ok(found)
    }

    async fn find_all(&self) -> StoreResult<Vec<OneGridUser>> {
        let rows = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM one_grid_user ORDER BY id"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all_one_grid_users", e))?;
        rows.iter().map(decode_member).collect()
    }

    async fn exists_by_id(&self, id: MemberId) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM one_grid_user WHERE id = $1) AS present")
            .bind(i64::from(id))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("exists_one_grid_user", e))?;
        row.try_get("present").map_err(|e| map_sqlx_error("exists_one_grid_user", e))
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, id: MemberId) -> StoreResult<bool> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM rel_todo__users WHERE users_id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("unlink_one_grid_user", e))?;
        let result = sqlx::query("DELETE FROM one_grid_user WHERE id = $1")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_one_grid_user", e))?;
        commit(tx).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl AuthorityRepository for PostgresStore {
    async fn save(&self, authority: Authority) -> StoreResult<Authority> {
        sqlx::query("INSERT INTO jhi_authority (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(&authority.name)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_authority", e))?;
        Ok(authority)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Authority>> {
        let row = sqlx::query("SELECT name FROM jhi_authority WHERE name = $1")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_authority", e))?;
        row.map(|r| r.try_get("name").map(|name| Authority { name }))
            .transpose()
            .map_err(|e| map_sqlx_error("find_authority", e))
    }

    async fn find_all(&self) -> StoreResult<Vec<Authority>> {
        let rows = sqlx::query("SELECT name FROM jhi_authority ORDER BY name")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all_authorities", e))?;
        rows.iter()
            .map(|r| r.try_get("name").map(|name| Authority { name }))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("find_all_authorities", e))
    }

    async fn delete_by_name(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM jhi_authority WHERE name = $1")
            .bind(name)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_authority", e))?;
        Ok(result.rows_affected() > 0)
    }
}
