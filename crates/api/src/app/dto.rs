use chrono::{DateTime, Utc};
use serde::Deserialize;

use austin_core::{MemberId, PageRequest, TodoId};
use austin_todos::{Group, MemberPatch, OneGridUser, Todo, TodoPatch};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

/// A user referenced from a todo body. Only the id is read; any other user
/// fields sent along are ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MemberRef {
    pub id: MemberId,
}

fn member_ids(refs: &[MemberRef]) -> Vec<MemberId> {
    refs.iter().map(|r| r.id).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRequest {
    pub id: Option<TodoId>,
    pub task: String,
    pub scheduled_time: String,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub last_modified_by: Option<i64>,
    #[serde(default)]
    pub users: Vec<MemberRef>,
}

impl TodoRequest {
    /// Split into the scalar todo (no users yet) and the referenced user ids.
    pub fn into_parts(self) -> (Todo, Vec<MemberId>) {
        let users = member_ids(&self.users);
        let mut todo = Todo::new(self.task, self.scheduled_time);
        todo.id = self.id;
        todo.valid_until = self.valid_until;
        todo.created_date = self.created_date;
        todo.last_modified_date = self.last_modified_date;
        todo.created_by = self.created_by;
        todo.last_modified_by = self.last_modified_by;
        (todo, users)
    }
}

/// Body of `PATCH /api/todos/{id}`; absent and `null` fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatchRequest {
    pub id: Option<TodoId>,
    pub task: Option<String>,
    pub scheduled_time: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub last_modified_by: Option<i64>,
    pub users: Option<Vec<MemberRef>>,
}

impl From<TodoPatchRequest> for TodoPatch {
    fn from(req: TodoPatchRequest) -> Self {
        TodoPatch {
            task: req.task,
            scheduled_time: req.scheduled_time,
            valid_until: req.valid_until,
            created_date: req.created_date,
            last_modified_date: req.last_modified_date,
            created_by: req.created_by,
            last_modified_by: req.last_modified_by,
            users: req.users.as_deref().map(member_ids),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRequest {
    pub id: Option<MemberId>,
    pub email: String,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub group: Option<Group>,
}

impl From<MemberRequest> for OneGridUser {
    fn from(req: MemberRequest) -> Self {
        let mut user = OneGridUser::new(req.email);
        user.id = req.id;
        user.date_of_birth = req.date_of_birth;
        user.group = req.group;
        user
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatchRequest {
    pub id: Option<MemberId>,
    #[serde(flatten)]
    pub patch: MemberPatch,
}

#[derive(Debug, Deserialize)]
pub struct AuthorityRequest {
    pub name: String,
}

// -------------------------
// Query parameters
// -------------------------

/// `GET /api/todos?eagerload=&page=&size=`
#[derive(Debug, Default, Deserialize)]
pub struct TodoListQuery {
    #[serde(default)]
    pub eagerload: bool,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl TodoListQuery {
    /// `None` when neither `page` nor `size` was given (unpaged listing).
    pub fn page_request(&self, default_size: u32, max_size: u32) -> Result<Option<PageRequest>, ApiError> {
        if self.page.is_none() && self.size.is_none() {
            return Ok(None);
        }
        let size = self.size.unwrap_or(default_size).min(max_size);
        PageRequest::new(self.page.unwrap_or(0), size)
            .map(Some)
            .map_err(ApiError::from)
    }
}

// -------------------------
// Path parameters
// -------------------------

pub fn parse_todo_id(raw: &str) -> Result<TodoId, ApiError> {
    raw.parse().map_err(ApiError::from)
}

pub fn parse_member_id(raw: &str) -> Result<MemberId, ApiError> {
    raw.parse().map_err(ApiError::from)
}
