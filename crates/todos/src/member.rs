use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use austin_core::{DomainError, DomainResult, Entity, MemberId, TodoId, same_identity};

/// Group a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Group {
    Admin,
    Moderator,
    User,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Admin => "ADMIN",
            Group::Moderator => "MODERATOR",
            Group::User => "USER",
        }
    }
}

impl core::str::FromStr for Group {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Group::Admin),
            "MODERATOR" => Ok(Group::Moderator),
            "USER" => Ok(Group::User),
            other => Err(DomainError::validation(format!("unknown group: {other}"))),
        }
    }
}

/// A one-grid user: the member side of the todo/user association.
///
/// `todos` is the inverse view of the association. It is derived from the
/// owning side and never persisted or serialised on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneGridUser {
    pub id: Option<MemberId>,
    pub email: String,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub group: Option<Group>,
    #[serde(skip)]
    pub todos: BTreeSet<TodoId>,
}

impl OneGridUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            date_of_birth: None,
            group: None,
            todos: BTreeSet::new(),
        }
    }

    pub fn with_id(mut self, id: MemberId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.email.trim().is_empty() {
            return Err(DomainError::validation("email is required"));
        }
        Ok(())
    }
}

impl Entity for OneGridUser {
    type Id = MemberId;

    fn id(&self) -> Option<MemberId> {
        self.id
    }
}

impl PartialEq for OneGridUser {
    fn eq(&self, other: &Self) -> bool {
        same_identity(self, other)
    }
}

/// Partial update of a user: only present fields overwrite stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    pub email: Option<String>,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub group: Option<Group>,
}

impl MemberPatch {
    pub fn apply_to(&self, user: &mut OneGridUser) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(dob) = self.date_of_birth {
            user.date_of_birth = Some(dob);
        }
        if let Some(group) = self.group {
            user.group = Some(group);
        }
    }
}
