//! Mapping of domain failures to HTTP responses

use axum::{
    extract::multipart::MultipartError,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use drive::DriveError;
use oauth::OAuthError;
use tracing::{error, warn};

use crate::pages;

/// Handler error
#[derive(Debug)]
pub enum AppError {
    Auth(OAuthError),
    Drive(DriveError),
    /// Malformed or oversized multipart upload
    Multipart(MultipartError),
    /// The request itself was unusable
    BadRequest(String),
    /// A page template failed to render
    Render(askama::Error),
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        Self::Render(e)
    }
}

impl From<OAuthError> for AppError {
    fn from(e: OAuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e)
    }
}

impl From<DriveError> for AppError {
    fn from(e: DriveError) -> Self {
        Self::Drive(e)
    }
}

/// 302 to the given location
pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

pub fn redirect_to_authorize() -> Response {
    redirect("/authorize")
}

fn page(status: StatusCode, title: &str, message: &str) -> Response {
    match pages::message(title, message) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Failed to render error page: {}", e);
            (status, message.to_string()).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(OAuthError::StateMismatch) => {
                warn!("Rejected OAuth callback with mismatched state");
                page(
                    StatusCode::BAD_REQUEST,
                    "Sign-in failed",
                    "The sign-in response did not match this session. Please sign in again.",
                )
            }
            AppError::Auth(OAuthError::Storage(e)) => {
                error!("Session storage failure: {}", e);
                page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error",
                    "Your session could not be read or saved.",
                )
            }
            AppError::Auth(e) => {
                warn!("Authorization failed, restarting sign-in: {}", e);
                redirect_to_authorize()
            }
            AppError::Drive(e) if e.requires_reauthorization() => {
                warn!("Drive rejected the access token, restarting sign-in");
                redirect_to_authorize()
            }
            AppError::Drive(DriveError::NotFound(id)) => page(
                StatusCode::NOT_FOUND,
                "Not found",
                &format!("No Drive file with id {}.", id),
            ),
            AppError::Drive(DriveError::InvalidFileId(id)) => page(
                StatusCode::BAD_REQUEST,
                "Bad request",
                &format!("{} is not a valid file id.", id),
            ),
            AppError::Drive(DriveError::Forbidden(message)) => {
                page(StatusCode::FORBIDDEN, "Forbidden", &message)
            }
            AppError::Drive(e) => {
                error!("Drive request failed: {}", e);
                page(
                    StatusCode::BAD_GATEWAY,
                    "Drive unavailable",
                    "Google Drive could not complete the request. Please try again.",
                )
            }
            AppError::Multipart(e) => {
                warn!("Rejected upload: {}", e.body_text());
                e.into_response()
            }
            AppError::BadRequest(message) => page(StatusCode::BAD_REQUEST, "Bad request", &message),
            AppError::Render(e) => {
                error!("Failed to render page: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: AppError) -> StatusCode {
        e.into_response().status()
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(status(OAuthError::StateMismatch.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(OAuthError::StateExpired.into()), StatusCode::FOUND);
        assert_eq!(
            status(OAuthError::TokenExchange("invalid_grant".into()).into()),
            StatusCode::FOUND
        );
        assert_eq!(
            status(OAuthError::Storage("disk full".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_drive_errors() {
        let response = AppError::from(DriveError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/authorize");

        assert_eq!(status(DriveError::NotFound("x".into()).into()), StatusCode::NOT_FOUND);
        assert_eq!(status(DriveError::Forbidden("no".into()).into()), StatusCode::FORBIDDEN);
        assert_eq!(
            status(DriveError::Api { status: 500, message: "boom".into() }.into()),
            StatusCode::BAD_GATEWAY
        );
    }
}
