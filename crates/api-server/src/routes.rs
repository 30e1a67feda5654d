use axum::{
    Extension,
    body::Body,
    extract::{Form, Multipart, Path, RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, redirect};
use crate::guard::Authenticated;
use crate::pages;
use crate::session;
use crate::state::AppState;

/// Landing page
pub async fn index(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Html<String>, AppError> {
    let signed_in = match session::current(&jar, state.cookie_name()) {
        Some(id) => state.auth.is_authenticated(&id).await.unwrap_or_else(|e| {
            warn!("Could not read session: {}", e);
            false
        }),
        None => false,
    };
    Ok(Html(pages::index(signed_in)?))
}

/// Simple health check endpoint
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "cloud-drive",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Starts sign-in: remembers the pending authorization and sends the
/// browser to Google
pub async fn authorize(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Response), AppError> {
    let (jar, id) = session::ensure(jar, state.cookie_name());
    let url = state.auth.authorize(&id).await?;
    Ok((jar, redirect(&url)))
}

/// Google redirects here after consent
pub async fn oauth2callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    // Without a session there is no state to compare against
    let id = session::current(&jar, state.cookie_name())
        .ok_or(AppError::Auth(oauth::OAuthError::StateMismatch))?;

    let callback_url = format!(
        "{}?{}",
        state.config.google.redirect_uri,
        query.unwrap_or_default()
    );
    state.auth.callback(&id, &callback_url).await?;
    Ok(redirect("/"))
}

/// Revokes the credential and forgets the session
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Response), AppError> {
    if let Some(id) = session::current(&jar, state.cookie_name()) {
        state.auth.logout(&id).await?;
    }
    let jar = session::clear(jar, state.cookie_name());
    Ok((jar, redirect("/")))
}

pub async fn upload_form() -> Result<Html<String>, AppError> {
    Ok(Html(pages::upload_form()?))
}

/// Uploads the multipart field `file` to the user's Drive
pub async fn upload(
    State(state): State<AppState>,
    Extension(auth): Extension<Authenticated>,
    mut multipart: Multipart,
) -> Result<Html<String>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let Some(name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            return Err(AppError::BadRequest("No file selected.".to_string()));
        };
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;

        let file = state
            .drive
            .upload(&auth.credential.access_token, &name, &mime_type, data)
            .await?;
        return Ok(Html(pages::uploaded(&file)?));
    }

    Err(AppError::BadRequest(
        "The upload did not include a file.".to_string(),
    ))
}

/// Streams a Drive file back as an attachment
pub async fn download(
    State(state): State<AppState>,
    Extension(auth): Extension<Authenticated>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let (file, stream) = state
        .drive
        .download(&auth.credential.access_token, &file_id)
        .await?;

    let content_type = file
        .mime_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(&file.name)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Deletes a Drive file
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<Authenticated>,
    Path(file_id): Path<String>,
) -> Result<Html<String>, AppError> {
    state
        .drive
        .delete(&auth.credential.access_token, &file_id)
        .await?;
    Ok(Html(pages::deleted(&file_id)?))
}

pub async fn share_form(Path(file_id): Path<String>) -> Result<Html<String>, AppError> {
    Ok(Html(pages::share_form(&file_id)?))
}

#[derive(Debug, Deserialize)]
pub struct ShareForm {
    pub email: String,
}

/// Grants the given address access to a Drive file
pub async fn share(
    State(state): State<AppState>,
    Extension(auth): Extension<Authenticated>,
    Path(file_id): Path<String>,
    Form(form): Form<ShareForm>,
) -> Result<Html<String>, AppError> {
    let email = form.email.trim();
    if !looks_like_email(email) {
        return Err(AppError::BadRequest(format!(
            "{} is not an email address.",
            email
        )));
    }

    state
        .drive
        .share(
            &auth.credential.access_token,
            &file_id,
            email,
            &state.config.drive.share_role,
        )
        .await?;
    info!("Session {:?} shared {}", auth.session, file_id);
    Ok(Html(pages::shared(&file_id, email)?))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// File name safe to quote inside a Content-Disposition header
fn attachment_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}
