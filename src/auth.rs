use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Id, User};
use crate::repo::RepoError;
use crate::routes::AppState;

pub const SESSION_COOKIE: &str = "msgboard_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Id,
    pub username: String,
    pub exp: usize,
}

/// Signs and verifies session tokens and shapes the session cookie.
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    ttl_hours: i64,
    secure_cookie: bool,
}

impl SessionKeys {
    pub fn new(secret: impl Into<String>, ttl_hours: i64, secure_cookie: bool) -> Self {
        Self { secret: secret.into(), ttl_hours, secure_cookie }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.jwt_secret.clone(), cfg.session_ttl_hours, cfg.cookie_secure)
    }

    /// Create a session token for a user.
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(self.ttl_hours)).timestamp() as usize;
        let claims = Claims { sub: user.id, username: user.username.clone(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation)?;
        Ok(data.claims)
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(time::Duration::hours(self.ttl_hours))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .finish();
        cookie.make_removal();
        cookie
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

// Verified against when the username is unknown, so both paths cost one
// argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| match hash_password("msgboard-dummy-password") {
    Ok(hash) => Some(hash),
    Err(e) => {
        tracing::error!(error = %e, "failed to prepare dummy password hash");
        None
    }
});

/// Checks a login attempt. `stored` is the account's hash, `None` when no
/// such account exists; that case always fails after equal work.
pub fn check_login(password: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn session_token(req: &HttpRequest, pl: &mut Payload) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    BearerAuth::from_request(req, pl)
        .into_inner()
        .ok()
        .map(|bearer| bearer.token().to_string())
}

/// Extractor yielding the logged-in user. Requests without a valid session
/// are answered with a redirect to `/`.
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let token = session_token(req, pl);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let Some(state) = state else {
                tracing::error!("AppState missing from app data");
                return Err(AppError::Internal);
            };
            let token = token.ok_or(AppError::Unauthenticated)?;
            let claims = state.sessions.verify(&token).map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                AppError::Unauthenticated
            })?;
            match state.repo.get_user(claims.sub).await {
                Ok(user) => Ok(CurrentUser(user)),
                // account vanished since the token was issued
                Err(RepoError::NotFound) => Err(AppError::Unauthenticated),
                Err(e) => Err(e.into()),
            }
        })
    }
}
