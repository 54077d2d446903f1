#![cfg(feature = "inmem-store")]

mod common;

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::{test, web, App};
use common::*;
use msgboard::auth::SESSION_COOKIE;
use msgboard::config;
use msgboard::rate_limit::{RateLimitConfig, RateLimiterFacade};
use msgboard::repo::UserRepo;

fn session_from(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == SESSION_COOKIE).map(|c| c.into_owned())
}

#[actix_web::test]
async fn root_offers_login_and_signup() {
    let (state, _repo) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    for uri in ["/", "/login", "/signup"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), 200, "{uri}");
    }
    let body = body_string(test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await).await;
    assert!(body.contains(r#"href="/login""#));
    assert!(body.contains(r#"href="/signup""#));
}

#[actix_web::test]
async fn signup_then_browse_then_logout() {
    let (state, repo) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([("user[username]", "Aspen James"), ("user[password]", "password123")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/boards");
    let cookie = session_from(&resp).expect("session cookie");
    assert_eq!(cookie.http_only(), Some(true));

    let stored = repo.find_user_by_username("Aspen James").await.unwrap().unwrap();
    assert_ne!(stored.password_hash, "password123");

    let req = test::TestRequest::get().uri("/boards").cookie(cookie.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert!(body_string(resp).await.contains("Logged in as Aspen James"));

    let req = test::TestRequest::post().uri("/logout").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/");
    let cleared = session_from(&resp).expect("removal cookie");
    assert_eq!(cleared.value(), "");
}

#[actix_web::test]
async fn signup_rejects_duplicates_and_bad_input() {
    let (state, repo) = state();
    user(&repo, "taken").await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([("user[username]", "taken"), ("user[password]", "password123")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
    assert!(session_from(&resp).is_none());
    assert!(body_string(resp).await.contains("Username has already been taken"));

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([("user[username]", "  "), ("user[password]", "123")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
    let body = body_string(resp).await;
    assert!(body.contains("Username can't be blank"));
    assert!(body.contains("Password is too short (minimum is 8 characters)"));
}

#[actix_web::test]
async fn login_checks_password() {
    let (state, _repo) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let req = test::TestRequest::post()
        .uri("/signup")
        .set_form([("user[username]", "rowan"), ("user[password]", "hunter2hunter2")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("session[username]", "rowan"), ("session[password]", "wrong-password")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
    assert!(session_from(&resp).is_none());
    assert!(body_string(resp).await.contains("Invalid username or password"));

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("session[username]", "nobody"), ("session[password]", "hunter2hunter2")])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 422);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("session[username]", "rowan"), ("session[password]", "hunter2hunter2")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/boards");
    assert!(session_from(&resp).is_some());
}

#[actix_web::test]
async fn bearer_token_is_accepted() {
    let (state, repo) = state();
    let u = user(&repo, "api-user").await;
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    let token = keys().issue(&u).unwrap();
    let req = test::TestRequest::get()
        .uri("/boards")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn login_attempts_are_throttled() {
    let cfg = RateLimitConfig { login_limit: 2, ..RateLimitConfig::default() };
    let (state, _repo) = state_with_limiter(Some(RateLimiterFacade::new(cfg)));
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

    for expected in [422, 422, 429] {
        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("session[username]", "ghost"), ("session[password]", "whatever1")])
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), expected);
    }
}
