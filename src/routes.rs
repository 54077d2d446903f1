use std::collections::HashMap;
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::{self, CurrentUser, SessionKeys};
use crate::error::AppError;
use crate::models::*;
use crate::policy;
use crate::rate_limit::RateLimiterFacade;
use crate::repo::{Repo, RepoError};
use crate::validation::{self, ValidationErrors};
use crate::views::{self, BoardFormMode, BoardFormValues};

/// Messages shown per board on the index page.
pub const PREVIEW_MESSAGES: usize = 2;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(
            web::resource("/signup")
                .route(web::get().to(signup_form))
                .route(web::post().to(signup)),
        )
        .service(
            web::resource("/login")
                .route(web::get().to(login_form))
                .route(web::post().to(login)),
        )
        .service(web::resource("/logout").route(web::post().to(logout)))
        .service(
            web::resource("/boards")
                .route(web::get().to(list_boards))
                .route(web::post().to(create_board)),
        )
        // registered before /boards/{id} so "new" is not taken as an id
        .service(web::resource("/boards/new").route(web::get().to(new_board)))
        .service(
            web::resource("/boards/{id}")
                .route(web::get().to(show_board))
                .route(web::patch().to(update_board))
                .route(web::delete().to(delete_board))
                .route(web::post().to(board_method_override)),
        )
        .service(web::resource("/boards/{id}/edit").route(web::get().to(edit_board)))
        .service(web::resource("/boards/{id}/delete").route(web::get().to(confirm_delete_board)))
        .service(web::resource("/boards/{id}/messages").route(web::post().to(create_message)));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub sessions: SessionKeys,
    pub rate_limiter: Option<RateLimiterFacade>,
}

// ---------------- forms -------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(rename = "user[username]", default)]
    pub username: String,
    #[serde(rename = "user[password]", default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "session[username]", default)]
    pub username: String,
    #[serde(rename = "session[password]", default)]
    pub password: String,
}

/// Board fields are optional so an update only touches the fields it carries.
#[derive(Debug, Default, Deserialize)]
pub struct BoardForm {
    #[serde(rename = "board[topic]", default)]
    pub topic: Option<String>,
    #[serde(rename = "board[description]", default)]
    pub description: Option<String>,
    /// Optional first message, only read on create.
    #[serde(rename = "message[content]", default)]
    pub message: String,
    /// HTML forms can only POST; `patch` / `delete` select the real action.
    #[serde(rename = "_method", default)]
    pub method: Option<String>,
}

impl BoardForm {
    fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or_default()
    }

    fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    fn values(&self) -> BoardFormValues {
        BoardFormValues {
            topic: self.topic().to_string(),
            description: self.description().to_string(),
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageForm {
    #[serde(rename = "message[content]", default)]
    pub content: String,
}

// ---------------- helpers -----------------------------------------------

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body)
}

fn redirect(to: &str) -> HttpResponse {
    HttpResponse::SeeOther().insert_header((header::LOCATION, to)).finish()
}

async fn usernames(data: &AppState, ids: impl IntoIterator<Item = Id>) -> Result<HashMap<Id, String>, AppError> {
    let mut ids: Vec<Id> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    let users = data.repo.find_users(&ids).await?;
    Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
}

fn name_of(names: &HashMap<Id, String>, id: Id) -> String {
    names.get(&id).cloned().unwrap_or_else(|| "unknown".to_string())
}

/// Board plus its messages (all, or the first `limit`) with author names.
async fn load_board_view(data: &AppState, board: Board, limit: Option<usize>) -> Result<BoardView, AppError> {
    let messages = data.repo.list_messages(board.id, limit).await?;
    let names = usernames(data, std::iter::once(board.creator_id).chain(messages.iter().map(|m| m.creator_id))).await?;
    Ok(BoardView {
        creator: name_of(&names, board.creator_id),
        messages: messages
            .into_iter()
            .map(|m| MessageView { author: name_of(&names, m.creator_id), message: m })
            .collect(),
        board,
    })
}

fn start_session(data: &AppState, user: &User) -> Result<HttpResponse, AppError> {
    let token = data.sessions.issue(user).map_err(|e| {
        tracing::error!(error = %e, "failed to sign session token");
        AppError::Internal
    })?;
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/boards"))
        .cookie(data.sessions.cookie(token))
        .finish())
}

// ---------------- session -----------------------------------------------

pub async fn root(user: Option<CurrentUser>) -> HttpResponse {
    html(StatusCode::OK, views::root(user.as_ref().map(|u| &u.0)))
}

pub async fn signup_form() -> HttpResponse {
    html(StatusCode::OK, views::signup_page("", &ValidationErrors::new()))
}

pub async fn signup(data: web::Data<AppState>, form: web::Form<SignupForm>) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let username = match validation::validate_signup(&form.username, &form.password) {
        Ok(name) => name,
        Err(errors) => return Ok(html(StatusCode::UNPROCESSABLE_ENTITY, views::signup_page(&form.username, &errors))),
    };
    let password_hash = auth::hash_password(&form.password).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        AppError::Internal
    })?;
    let user = match data.repo.create_user(NewUser { username, password_hash }).await {
        Ok(user) => user,
        Err(RepoError::Conflict) => {
            let mut errors = ValidationErrors::new();
            errors.add("username", "has already been taken");
            return Ok(html(StatusCode::UNPROCESSABLE_ENTITY, views::signup_page(&form.username, &errors)));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = user.id, "user signed up");
    start_session(&data, &user)
}

pub async fn login_form() -> HttpResponse {
    html(StatusCode::OK, views::login_page("", None))
}

pub async fn login(data: web::Data<AppState>, form: web::Form<LoginForm>) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let username = form.username.trim();
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_login(username) {
            return Err(AppError::TooManyRequests);
        }
    }
    let user = data.repo.find_user_by_username(username).await?;
    let verified = auth::check_login(&form.password, user.as_ref().map(|u| u.password_hash.as_str()));
    match user {
        Some(user) if verified => {
            tracing::info!(user_id = user.id, "user logged in");
            start_session(&data, &user)
        }
        _ => Ok(html(
            StatusCode::UNPROCESSABLE_ENTITY,
            views::login_page(username, Some("Invalid username or password")),
        )),
    }
}

pub async fn logout(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(data.sessions.removal_cookie())
        .finish()
}

// ---------------- boards ------------------------------------------------

pub async fn list_boards(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let boards = data.repo.list_boards().await?;
    let mut previews = Vec::with_capacity(boards.len());
    for board in boards {
        previews.push(load_board_view(&data, board, Some(PREVIEW_MESSAGES)).await?);
    }
    Ok(html(StatusCode::OK, views::boards_index(&user.0, &previews)))
}

pub async fn new_board(user: CurrentUser) -> HttpResponse {
    html(
        StatusCode::OK,
        views::board_form(&user.0, BoardFormMode::New, &BoardFormValues::default(), &ValidationErrors::new()),
    )
}

pub async fn create_board(
    user: CurrentUser,
    data: web::Data<AppState>,
    form: web::Form<BoardForm>,
) -> Result<HttpResponse, AppError> {
    let user = user.0;
    let form = form.into_inner();
    let new = match validation::validate_new_board(form.topic(), form.description(), user.id) {
        Ok(new) => new,
        Err(errors) => {
            return Ok(html(
                StatusCode::UNPROCESSABLE_ENTITY,
                views::board_form(&user, BoardFormMode::New, &form.values(), &errors),
            ))
        }
    };
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_board(user.id) {
            return Err(AppError::TooManyRequests);
        }
    }
    let first_message = validation::optional_text(&form.message);
    let board = data.repo.create_board(new, first_message).await?;
    tracing::info!(board_id = board.id, user_id = user.id, "board created");
    Ok(redirect(&format!("/boards/{}", board.id)))
}

pub async fn show_board(user: CurrentUser, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, AppError> {
    let board = data.repo.get_board(path.into_inner()).await?;
    let view = load_board_view(&data, board, None).await?;
    Ok(html(StatusCode::OK, views::board_show(&user.0, &view, "", &ValidationErrors::new())))
}

pub async fn edit_board(user: CurrentUser, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, AppError> {
    let board = data.repo.get_board(path.into_inner()).await?;
    policy::authorize_modify(&user.0, &board)?;
    let values = BoardFormValues {
        topic: board.topic.clone(),
        description: board.description.clone().unwrap_or_default(),
        message: String::new(),
    };
    Ok(html(
        StatusCode::OK,
        views::board_form(&user.0, BoardFormMode::Edit(board.id), &values, &ValidationErrors::new()),
    ))
}

pub async fn update_board(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<BoardForm>,
) -> Result<HttpResponse, AppError> {
    apply_board_update(user.0, &data, path.into_inner(), form.into_inner()).await
}

async fn apply_board_update(user: User, data: &AppState, id: Id, form: BoardForm) -> Result<HttpResponse, AppError> {
    let board = data.repo.get_board(id).await?;
    policy::authorize_modify(&user, &board)?;
    // fields missing from the submission keep their stored values
    let values = BoardFormValues {
        topic: form.topic.unwrap_or(board.topic),
        description: form.description.or(board.description).unwrap_or_default(),
        message: String::new(),
    };
    let upd = match validation::validate_board_update(&values.topic, &values.description) {
        Ok(upd) => upd,
        Err(errors) => {
            return Ok(html(
                StatusCode::UNPROCESSABLE_ENTITY,
                views::board_form(&user, BoardFormMode::Edit(id), &values, &errors),
            ))
        }
    };
    let board = data.repo.update_board(id, upd).await?;
    tracing::info!(board_id = board.id, user_id = user.id, "board updated");
    Ok(redirect(&format!("/boards/{}", board.id)))
}

pub async fn confirm_delete_board(user: CurrentUser, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, AppError> {
    let board = data.repo.get_board(path.into_inner()).await?;
    policy::authorize_modify(&user.0, &board)?;
    let count = data.repo.count_messages(board.id).await?;
    Ok(html(StatusCode::OK, views::board_delete_confirm(&user.0, &board, count)))
}

pub async fn delete_board(user: CurrentUser, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, AppError> {
    apply_board_delete(user.0, &data, path.into_inner()).await
}

async fn apply_board_delete(user: User, data: &AppState, id: Id) -> Result<HttpResponse, AppError> {
    let board = data.repo.get_board(id).await?;
    policy::authorize_modify(&user, &board)?;
    let removed = data.repo.delete_board(id).await?;
    tracing::info!(board_id = id, user_id = user.id, messages_removed = removed, "board deleted");
    Ok(redirect("/boards"))
}

/// `POST /boards/{id}` carrying `_method=patch|delete`.
pub async fn board_method_override(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<BoardForm>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let form = form.into_inner();
    match form.method.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("patch") | Some("put") => apply_board_update(user.0, &data, id, form).await,
        Some("delete") => apply_board_delete(user.0, &data, id).await,
        _ => Err(AppError::BadRequest),
    }
}

// ---------------- messages ----------------------------------------------

pub async fn create_message(
    user: CurrentUser,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<MessageForm>,
) -> Result<HttpResponse, AppError> {
    let user = user.0;
    let board = data.repo.get_board(path.into_inner()).await?;
    let form = form.into_inner();
    let content = match validation::validate_message_content(&form.content) {
        Ok(content) => content,
        Err(errors) => {
            let view = load_board_view(&data, board, None).await?;
            return Ok(html(
                StatusCode::UNPROCESSABLE_ENTITY,
                views::board_show(&user, &view, &form.content, &errors),
            ));
        }
    };
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_message(user.id) {
            return Err(AppError::TooManyRequests);
        }
    }
    let message = data
        .repo
        .create_message(NewMessage { board_id: board.id, content, creator_id: user.id })
        .await?;
    tracing::info!(message_id = message.id, board_id = board.id, user_id = user.id, "message posted");
    Ok(redirect(&format!("/boards/{}", board.id)))
}
