use serde::{Deserialize, Serialize};

use austin_core::{DomainError, DomainResult};

/// A named authority (role), keyed by its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Authority {
    pub name: String,
}

impl Authority {
    pub const MAX_NAME_LEN: usize = 50;

    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("authority name is required"));
        }
        if trimmed.chars().count() > Self::MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "authority name must be at most {} characters",
                Self::MAX_NAME_LEN
            )));
        }
        Ok(Self {
            name: trimmed.to_string(),
        })
    }
}
