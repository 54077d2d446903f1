use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::repo::RepoError;
use crate::views;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// No valid session; answered with a redirect to the root page.
    #[error("login required")] Unauthenticated,
    #[error("you are not allowed to do that")] Forbidden,
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("bad request")] BadRequest,
    #[error("too many requests, slow down")] TooManyRequests,
    #[error("internal error")] Internal,
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::NotFound,
            RepoError::Conflict => AppError::Conflict,
            RepoError::Internal(msg) => {
                tracing::error!(error = %msg, "repository failure");
                AppError::Internal
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::SEE_OTHER,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Unauthenticated = self {
            return HttpResponse::SeeOther().insert_header((header::LOCATION, "/")).finish();
        }
        let status = self.status_code();
        HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(views::error_page(status, &self.to_string()))
    }
}
