use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Organizer,
    Participant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Organizer => f.write_str("organizer"),
            Role::Participant => f.write_str("participant"),
        }
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organizer" => Ok(Role::Organizer),
            "participant" => Ok(Role::Participant),
            _ => Err(EngineError::Unauthorized),
        }
    }
}

// Адресная книга для уведомлений, движок только читает её
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Identity already verified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn organizer(user_id: i64) -> Self {
        Self { user_id, role: Role::Organizer }
    }

    pub fn participant(user_id: i64) -> Self {
        Self { user_id, role: Role::Participant }
    }

    pub fn require_organizer(&self) -> EngineResult<()> {
        match self.role {
            Role::Organizer => Ok(()),
            Role::Participant => Err(EngineError::Unauthorized),
        }
    }

    pub fn require_participant(&self) -> EngineResult<()> {
        match self.role {
            Role::Participant => Ok(()),
            Role::Organizer => Err(EngineError::Unauthorized),
        }
    }
}
