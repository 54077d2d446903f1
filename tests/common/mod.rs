#![allow(dead_code)]

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::test;
use msgboard::auth::{SessionKeys, SESSION_COOKIE};
use msgboard::models::{Board, NewBoard, NewMessage, NewUser, User};
use msgboard::rate_limit::RateLimiterFacade;
use msgboard::repo::inmem::InMemRepo;
use msgboard::repo::{BoardRepo, MessageRepo, UserRepo};
use msgboard::AppState;

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

pub fn keys() -> SessionKeys {
    SessionKeys::new(SECRET, 24, false)
}

/// Fresh state over a repository that never touches disk. The returned repo
/// shares storage with the one inside the state.
pub fn state() -> (AppState, InMemRepo) {
    state_with_limiter(None)
}

pub fn state_with_limiter(rate_limiter: Option<RateLimiterFacade>) -> (AppState, InMemRepo) {
    let repo = InMemRepo::ephemeral();
    let state = AppState { repo: Arc::new(repo.clone()), sessions: keys(), rate_limiter };
    (state, repo)
}

pub async fn user(repo: &InMemRepo, username: &str) -> User {
    repo.create_user(NewUser { username: username.into(), password_hash: "unused".into() })
        .await
        .unwrap()
}

pub async fn board(repo: &InMemRepo, creator: &User, topic: &str, description: &str) -> Board {
    repo.create_board(
        NewBoard { topic: topic.into(), description: Some(description.into()), creator_id: creator.id },
        None,
    )
    .await
    .unwrap()
}

pub async fn message(repo: &InMemRepo, board: &Board, author: &User, content: &str) {
    repo.create_message(NewMessage { board_id: board.id, content: content.into(), creator_id: author.id })
        .await
        .unwrap();
}

/// Two users, a lunch board with three messages and a coffee board.
pub struct Seed {
    pub author: User,
    pub other: User,
    pub lunch: Board,
    pub coffee: Board,
}

pub async fn seed(repo: &InMemRepo) -> Seed {
    let author = user(repo, "Aspen James").await;
    let other = user(repo, "Rowan Blake").await;
    let lunch = board(repo, &author, "Lunchtime!", "Where should we eat?").await;
    for content in ["Message1", "Message2", "Message3"] {
        message(repo, &lunch, &other, content).await;
    }
    let coffee = board(repo, &other, "Coffee Break", "Espresso or drip?").await;
    Seed { author, other, lunch, coffee }
}

pub fn session_cookie(user: &User) -> Cookie<'static> {
    Cookie::new(SESSION_COOKIE, keys().issue(user).unwrap())
}

pub async fn body_string(resp: ServiceResponse) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

pub fn location(resp: &ServiceResponse) -> String {
    resp.headers()
        .get("location")
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}
