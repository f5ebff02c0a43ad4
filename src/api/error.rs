//! HTTP-facing errors.
//!
//! Form and credential failures are handled inside the handlers (redisplay
//! with a message). What reaches this type ends the request: a redirect to the
//! login page, a 403/404 page, or a 500 with the detail kept in the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use super::views;
use crate::accounts::AccountError;
use crate::todo::TaskError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {0} belongs to another user")]
    Forbidden(i64),

    #[error("account store error: {0}")]
    Account(#[source] AccountError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => Self::NotFound(id.to_string()),
            TaskError::Forbidden(id) => Self::Forbidden(id),
            TaskError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Storage(e) => Self::Storage(e),
            other => Self::Account(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => Redirect::to("/login").into_response(),
            Self::NotFound(_) => (
                StatusCode::NOT_FOUND,
                views::error_page(StatusCode::NOT_FOUND, "That task does not exist."),
            )
                .into_response(),
            Self::Forbidden(id) => {
                tracing::warn!("Refused access to task {}", id);
                (
                    StatusCode::FORBIDDEN,
                    views::error_page(
                        StatusCode::FORBIDDEN,
                        "You do not have permission to change that task.",
                    ),
                )
                    .into_response()
            }
            Self::Account(e) => internal(&e),
            Self::Storage(e) => internal(&e),
        }
    }
}

fn internal(err: &dyn std::error::Error) -> Response {
    tracing::error!("Request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        views::error_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something went wrong. Please try again.",
        ),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(TaskError::NotFound(1)).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(TaskError::Forbidden(1)).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AccountError::DuplicateEmail)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let redirect = AppError::Unauthenticated.into_response();
        assert!(redirect.status().is_redirection());
        assert_eq!(redirect.headers()["location"], "/login");
    }
}
