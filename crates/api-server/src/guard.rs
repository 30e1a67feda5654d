//! Login requirement for Drive routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use oauth::{CredentialRecord, SessionId};
use tracing::debug;

use crate::error::{AppError, redirect_to_authorize};
use crate::session;
use crate::state::AppState;

/// Proof of a valid credential, inserted for handlers behind the guard
#[derive(Clone, Debug)]
pub struct Authenticated {
    pub session: SessionId,
    pub credential: CredentialRecord,
}

/// Lets the request through only with a valid (possibly refreshed) credential
///
/// Anyone else is sent to `/authorize`.
pub async fn require_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session) = session::current(&jar, state.cookie_name()) else {
        debug!("No session cookie on {}", request.uri().path());
        return redirect_to_authorize();
    };

    match state.auth.credential(&session).await {
        Ok(Some(credential)) => {
            request
                .extensions_mut()
                .insert(Authenticated { session, credential });
            next.run(request).await
        }
        Ok(None) => {
            debug!("Session {:?} has no usable credential", session);
            redirect_to_authorize()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
