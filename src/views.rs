//! Server-rendered HTML pages.
//!
//! Every piece of user-supplied text goes through [`escape`]; attribute values
//! are always double-quoted.

use std::fmt::Write as _;

use actix_web::http::StatusCode;

use crate::models::{Board, BoardView, Id, User};
use crate::policy;
use crate::validation::ValidationErrors;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&User>, body: &str) -> String {
    let nav = match user {
        Some(u) => format!(
            r#"<span class="current-user">Logged in as {}</span> <a href="/boards">Boards</a> <form class="inline" method="post" action="/logout"><button type="submit">Log out</button></form>"#,
            escape(&u.username)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/signup">Sign up</a>"#.to_string(),
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{} | Message Board</title>\n</head>\n<body>\n<nav>{nav}</nav>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        escape(title)
    )
}

/// Wraps an input in the error marker when `field` failed validation.
fn field(errors: &ValidationErrors, name: &str, inner: String) -> String {
    if errors.has(name) {
        format!(r#"<div class="field_with_errors">{inner}</div>"#)
    } else {
        inner
    }
}

fn error_explanation(errors: &ValidationErrors, subject: &str) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let n = errors.len();
    let mut out = format!(
        r#"<div id="error_explanation"><h2>{n} {} prohibited this {subject} from being saved:</h2><ul>"#,
        if n == 1 { "error" } else { "errors" }
    );
    for msg in errors.full_messages() {
        let _ = write!(out, "<li>{}</li>", escape(&msg));
    }
    out.push_str("</ul></div>");
    out
}

pub fn root(user: Option<&User>) -> String {
    let body = match user {
        Some(u) => format!(
            r#"<h1>Message Board</h1><p>Welcome back, {}.</p><p><a href="/boards">Go to the boards</a></p>"#,
            escape(&u.username)
        ),
        None => r#"<h1>Message Board</h1><p>Log in or sign up to read and post on the boards.</p><p><a href="/login">Log in</a> or <a href="/signup">Sign up</a></p>"#.to_string(),
    };
    layout("Welcome", user, &body)
}

pub fn login_page(username: &str, error: Option<&str>) -> String {
    let alert = error
        .map(|e| format!(r#"<p class="alert">{}</p>"#, escape(e)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Log in</h1>{alert}<form method="post" action="/login">
<label for="session_username">Username</label> <input type="text" id="session_username" name="session[username]" value="{}">
<label for="session_password">Password</label> <input type="password" id="session_password" name="session[password]">
<button type="submit">Log in</button>
</form><p>No account yet? <a href="/signup">Sign up</a></p>"#,
        escape(username)
    );
    layout("Log in", None, &body)
}

pub fn signup_page(username: &str, errors: &ValidationErrors) -> String {
    let body = format!(
        r#"<h1>Sign up</h1>{}<form method="post" action="/signup">
{}
{}
<button type="submit">Create account</button>
</form><p>Already registered? <a href="/login">Log in</a></p>"#,
        error_explanation(errors, "user"),
        field(errors, "username", format!(
            r#"<label for="user_username">Username</label> <input type="text" id="user_username" name="user[username]" value="{}">"#,
            escape(username)
        )),
        field(errors, "password", r#"<label for="user_password">Password</label> <input type="password" id="user_password" name="user[password]">"#.to_string()),
    );
    layout("Sign up", None, &body)
}

pub fn boards_index(user: &User, boards: &[BoardView]) -> String {
    let mut body = String::from(r#"<h1>Boards</h1><p><a href="/boards/new">New board</a></p>"#);
    if boards.is_empty() {
        body.push_str("<p>No boards yet.</p>");
    }
    for view in boards {
        let b = &view.board;
        let _ = write!(
            body,
            r#"<section class="board" id="board_{}"><h2>{}</h2>{}<p class="creator">Created by {}</p><ul class="messages">"#,
            b.id,
            escape(&b.topic),
            description(b),
            escape(&view.creator),
        );
        for m in &view.messages {
            let _ = write!(
                body,
                r#"<li class="message">{} <span class="author">by {}</span></li>"#,
                escape(&m.message.content),
                escape(&m.author)
            );
        }
        let _ = write!(body, r#"</ul><a href="/boards/{}">View all...</a></section>"#, b.id);
    }
    layout("Boards", Some(user), &body)
}

fn description(b: &Board) -> String {
    b.description
        .as_deref()
        .map(|d| format!(r#"<p class="description">{}</p>"#, escape(d)))
        .unwrap_or_default()
}

/// Board detail; `content` and `errors` belong to the message form.
pub fn board_show(user: &User, view: &BoardView, content: &str, errors: &ValidationErrors) -> String {
    let b = &view.board;
    let mut body = format!(
        r#"<h1>{}</h1>{}<p class="creator">Created by {}</p>"#,
        escape(&b.topic),
        description(b),
        escape(&view.creator)
    );
    if policy::can_modify(user, b) {
        let _ = write!(
            body,
            r#"<p class="actions"><a href="/boards/{id}/edit">Edit board</a> <a href="/boards/{id}/delete">Delete board</a></p>"#,
            id = b.id
        );
    }
    body.push_str(r#"<ul class="messages">"#);
    for m in &view.messages {
        let _ = write!(
            body,
            r#"<li class="message" id="message_{}">{} <span class="author">by {}</span></li>"#,
            m.message.id,
            escape(&m.message.content),
            escape(&m.author)
        );
    }
    body.push_str("</ul>");
    let _ = write!(
        body,
        r#"<h2>Post a message</h2>{}<form method="post" action="/boards/{}/messages">
{}
<button type="submit">Post message</button>
</form><p><a href="/boards">Back to boards</a></p>"#,
        error_explanation(errors, "message"),
        b.id,
        field(errors, "content", format!(
            r#"<label for="message_content">Message</label> <textarea id="message_content" name="message[content]">{}</textarea>"#,
            escape(content)
        )),
    );
    layout(&b.topic, Some(user), &body)
}

/// Values echoed back into the board form.
#[derive(Debug, Default, Clone)]
pub struct BoardFormValues {
    pub topic: String,
    pub description: String,
    pub message: String,
}

pub enum BoardFormMode {
    New,
    Edit(Id),
}

pub fn board_form(user: &User, mode: BoardFormMode, values: &BoardFormValues, errors: &ValidationErrors) -> String {
    let (title, action, method, first_message) = match mode {
        BoardFormMode::New => (
            "New board".to_string(),
            "/boards".to_string(),
            String::new(),
            format!(
                r#"<label for="message_content">First message (optional)</label> <textarea id="message_content" name="message[content]">{}</textarea>"#,
                escape(&values.message)
            ),
        ),
        BoardFormMode::Edit(id) => (
            "Edit board".to_string(),
            format!("/boards/{id}"),
            r#"<input type="hidden" name="_method" value="patch">"#.to_string(),
            String::new(),
        ),
    };
    let body = format!(
        r#"<h1>{title}</h1>{}<form method="post" action="{action}">{method}
{}
<label for="board_description">Description</label> <textarea id="board_description" name="board[description]">{}</textarea>
{first_message}
<button type="submit">Save board</button>
</form><p><a href="/boards">Back to boards</a></p>"#,
        error_explanation(errors, "board"),
        field(errors, "topic", format!(
            r#"<label for="board_topic">Topic</label> <input type="text" id="board_topic" name="board[topic]" value="{}">"#,
            escape(&values.topic)
        )),
        escape(&values.description),
    );
    layout(&title, Some(user), &body)
}

/// Read-only confirmation step before a board is deleted.
pub fn board_delete_confirm(user: &User, board: &Board, message_count: usize) -> String {
    let body = format!(
        r#"<h1>Delete "{topic}"?</h1>
<p class="warning">This cannot be undone. Deleting this board also permanently deletes all {message_count} {noun} posted on it.</p>
<form method="post" action="/boards/{id}"><input type="hidden" name="_method" value="delete"><button type="submit">Yes, delete this board</button></form>
<p><a href="/boards/{id}">Cancel</a></p>"#,
        topic = escape(&board.topic),
        noun = if message_count == 1 { "message" } else { "messages" },
        id = board.id,
    );
    layout("Delete board", Some(user), &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        r#"<h1>{} {}</h1><p>{}</p><p><a href="/">Home</a></p>"#,
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error"),
        escape(message)
    );
    layout("Error", None, &body)
}
