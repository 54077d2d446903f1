#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use common::*;
use msgboard::config;
use msgboard::rate_limit::{RateLimitConfig, RateLimiterFacade};
use msgboard::repo::{BoardRepo, MessageRepo};

#[actix_web::test]
async fn message_posting_is_limited_per_user() {
    let cfg = RateLimitConfig { message_limit: 1, ..RateLimitConfig::default() };
    let (state, repo) = state_with_limiter(Some(RateLimiterFacade::new(cfg)));
    let s = seed(&repo).await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;
    let uri = format!("/boards/{}/messages", s.coffee.id);

    let req = test::TestRequest::post().uri(&uri).cookie(session_cookie(&s.author)).set_form([("message[content]", "one")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303, "first message allowed");

    let req = test::TestRequest::post().uri(&uri).cookie(session_cookie(&s.author)).set_form([("message[content]", "two")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 429, "second message limited");

    // another user has their own budget
    let req = test::TestRequest::post().uri(&uri).cookie(session_cookie(&s.other)).set_form([("message[content]", "three")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303);

    assert_eq!(repo.count_messages(s.coffee.id).await.unwrap(), 2);
}

#[actix_web::test]
async fn invalid_board_does_not_spend_budget() {
    let cfg = RateLimitConfig { board_limit: 1, ..RateLimitConfig::default() };
    let (state, repo) = state_with_limiter(Some(RateLimiterFacade::new(cfg)));
    let s = seed(&repo).await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let req = test::TestRequest::post().uri("/boards").cookie(session_cookie(&s.author)).set_form([("board[topic]", "")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 422);

    let req = test::TestRequest::post().uri("/boards").cookie(session_cookie(&s.author)).set_form([("board[topic]", "Real")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303);

    let req = test::TestRequest::post().uri("/boards").cookie(session_cookie(&s.author)).set_form([("board[topic]", "Again")]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 429);

    assert_eq!(repo.list_boards().await.unwrap().len(), 3);
}
