use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use austin_core::{
    AuditStamp, Auditable, DomainError, DomainResult, Entity, MemberId, TodoId, same_identity,
};

use crate::member::OneGridUser;

/// A todo: the owning side of the todo/user many-to-many association.
///
/// `users` has set semantics. It never holds two users with the same id and
/// is kept ordered by id so that two loads of the same row compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Option<TodoId>,
    pub task: String,
    pub scheduled_time: String,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub last_modified_by: Option<i64>,
    #[serde(default)]
    pub users: Vec<OneGridUser>,
}

impl Todo {
    pub fn new(task: impl Into<String>, scheduled_time: impl Into<String>) -> Self {
        Self {
            id: None,
            task: task.into(),
            scheduled_time: scheduled_time.into(),
            valid_until: None,
            created_date: None,
            last_modified_date: None,
            created_by: None,
            last_modified_by: None,
            users: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: TodoId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.task.trim().is_empty() {
            return Err(DomainError::validation("task is required"));
        }
        if self.scheduled_time.trim().is_empty() {
            return Err(DomainError::validation("scheduledTime is required"));
        }
        Ok(())
    }

    /// Ids of the users currently assigned, in ascending order.
    pub fn member_ids(&self) -> Vec<MemberId> {
        self.users.iter().filter_map(|u| u.id).collect()
    }

    /// Same todo with its user set emptied (the un-hydrated shape).
    pub fn without_users(mut self) -> Self {
        self.users.clear();
        self
    }

    /// Assign `user` to this todo and record the todo on the user's inverse view.
    pub fn add_user(&mut self, user: &mut OneGridUser) -> DomainResult<()> {
        if user.id.is_none() {
            return Err(DomainError::validation("cannot assign an unsaved user"));
        }
        if let Some(todo_id) = self.id {
            user.todos.insert(todo_id);
        }
        self.insert_user(user.clone());
        Ok(())
    }

    /// Unassign `user` from this todo on both sides. Returns whether it was assigned.
    pub fn remove_user(&mut self, user: &mut OneGridUser) -> bool {
        if let Some(todo_id) = self.id {
            user.todos.remove(&todo_id);
        }
        let Some(member_id) = user.id else {
            return false;
        };
        let before = self.users.len();
        self.users.retain(|u| u.id != Some(member_id));
        before != self.users.len()
    }

    /// Insert a loaded user into the set, replacing any entry with the same id.
    pub fn insert_user(&mut self, user: OneGridUser) {
        let Some(member_id) = user.id else {
            return;
        };
        match self.users.binary_search_by_key(&Some(member_id), |u| u.id) {
            Ok(idx) => self.users[idx] = user,
            Err(idx) => self.users.insert(idx, user),
        }
    }
}

impl Entity for Todo {
    type Id = TodoId;

    fn id(&self) -> Option<TodoId> {
        self.id
    }
}

impl PartialEq for Todo {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self, other)
    }
}

impl Auditable for Todo {
    fn stamp_created(&mut self, stamp: AuditStamp) {
        self.created_date.get_or_insert(stamp.at);
        self.last_modified_date.get_or_insert(stamp.at);
        if self.created_by.is_none() {
            self.created_by = stamp.actor;
        }
        if self.last_modified_by.is_none() {
            self.last_modified_by = stamp.actor;
        }
    }

    fn stamp_modified(&mut self, stamp: AuditStamp) {
        self.last_modified_date = Some(stamp.at);
        self.last_modified_by = stamp.actor;
    }
}

/// Partial update of a todo: only present fields overwrite stored values.
///
/// `users`, when present, replaces the whole assignment set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    pub task: Option<String>,
    pub scheduled_time: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub last_modified_by: Option<i64>,
    #[serde(skip)]
    pub users: Option<Vec<MemberId>>,
}

impl TodoPatch {
    /// Merge scalar fields into `todo`. Member replacement is left to the repository.
    pub fn apply_to(&self, todo: &mut Todo) {
        if let Some(task) = &self.task {
            todo.task = task.clone();
        }
        if let Some(scheduled_time) = &self.scheduled_time {
            todo.scheduled_time = scheduled_time.clone();
        }
        if self.valid_until.is_some() {
            todo.valid_until = self.valid_until;
        }
        if self.created_date.is_some() {
            todo.created_date = self.created_date;
        }
        if self.last_modified_date.is_some() {
            todo.last_modified_date = self.last_modified_date;
        }
        if self.created_by.is_some() {
            todo.created_by = self.created_by;
        }
        if self.last_modified_by.is_some() {
            todo.last_modified_by = self.last_modified_by;
        }
    }
}
