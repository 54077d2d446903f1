//! Ownership rules. The same check decides whether edit/delete controls are
//! rendered and whether the corresponding request is allowed through.

use crate::error::AppError;
use crate::models::{Board, Id, Message, User};

pub trait Owned {
    fn creator_id(&self) -> Id;
}

impl Owned for Board {
    fn creator_id(&self) -> Id { self.creator_id }
}

impl Owned for Message {
    fn creator_id(&self) -> Id { self.creator_id }
}

/// Only the creator may edit or delete a record.
pub fn can_modify<R: Owned>(user: &User, record: &R) -> bool {
    user.id == record.creator_id()
}

pub fn authorize_modify<R: Owned>(user: &User, record: &R) -> Result<(), AppError> {
    if can_modify(user, record) {
        Ok(())
    } else {
        tracing::warn!(user_id = user.id, owner_id = record.creator_id(), "modification denied");
        Err(AppError::Forbidden)
    }
}
