use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(default)]
    pub password_hash: String, // argon2 PHC string, never rendered
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Board {
    pub id: Id,
    pub topic: String,
    pub description: Option<String>,
    pub creator_id: Id, // fixed at creation
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub topic: String,
    pub description: Option<String>,
    pub creator_id: Id,
}

#[derive(Debug, Clone)]
pub struct UpdateBoard {
    pub topic: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "postgres-store", derive(sqlx::FromRow))]
pub struct Message {
    pub id: Id,
    pub board_id: Id,
    pub content: String,
    pub creator_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub board_id: Id,
    pub content: String,
    pub creator_id: Id,
}

/// A message paired with its author's display name.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub message: Message,
    pub author: String,
}

/// A board as rendered: creator name plus an ordered (possibly truncated)
/// slice of its messages.
#[derive(Debug, Clone)]
pub struct BoardView {
    pub board: Board,
    pub creator: String,
    pub messages: Vec<MessageView>,
}
