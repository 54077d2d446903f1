//! Field validation for submitted forms.
//!
//! Errors are collected per field, in insertion order, and rendered as
//! full messages ("Topic can't be blank") next to the offending inputs.

use crate::models::{NewBoard, UpdateBoard};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError { field, message: message.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when at least one error is attached to `field`.
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| full_message(e.field, &e.message)).collect()
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// "board_topic" + "can't be blank" -> "Board topic can't be blank"
pub fn full_message(field: &str, message: &str) -> String {
    let mut human = field.replace('_', " ");
    if let Some(first) = human.get(0..1) {
        let upper = first.to_uppercase();
        human.replace_range(0..1, &upper);
    }
    format!("{human} {message}")
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require_present(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    if is_blank(value) {
        errors.add(field, "can't be blank");
    }
}

/// Trimmed optional text: blank input is stored as absent.
pub fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn validate_new_board(topic: &str, description: &str, creator_id: crate::models::Id) -> Result<NewBoard, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_present(&mut errors, "topic", topic);
    errors.into_result(NewBoard {
        topic: topic.trim().to_string(),
        description: optional_text(description),
        creator_id,
    })
}

pub fn validate_board_update(topic: &str, description: &str) -> Result<UpdateBoard, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_present(&mut errors, "topic", topic);
    errors.into_result(UpdateBoard {
        topic: topic.trim().to_string(),
        description: optional_text(description),
    })
}

pub fn validate_message_content(content: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    require_present(&mut errors, "content", content);
    errors.into_result(content.trim().to_string())
}

/// Shape checks for sign-up; uniqueness is decided by the repository.
pub fn validate_signup(username: &str, password: &str) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let username = username.trim();
    let len = username.chars().count();
    if username.is_empty() {
        errors.add("username", "can't be blank");
    } else if len < USERNAME_MIN {
        errors.add("username", format!("is too short (minimum is {USERNAME_MIN} characters)"));
    } else if len > USERNAME_MAX {
        errors.add("username", format!("is too long (maximum is {USERNAME_MAX} characters)"));
    }
    if password.chars().count() < PASSWORD_MIN {
        errors.add("password", format!("is too short (minimum is {PASSWORD_MIN} characters)"));
    }
    errors.into_result(username.to_string())
}
