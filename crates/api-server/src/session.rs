//! Signed session cookie
//!
//! The cookie carries only the session id. Everything else lives in the
//! server-side session store.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use oauth::SessionId;

/// Session id from the jar, if the signed cookie is present and well formed
pub fn current(jar: &SignedCookieJar, name: &str) -> Option<SessionId> {
    jar.get(name)
        .and_then(|cookie| SessionId::parse(cookie.value()))
}

/// Returns the existing session id or issues a new one
pub fn ensure(jar: SignedCookieJar, name: &str) -> (SignedCookieJar, SessionId) {
    match current(&jar, name) {
        Some(id) => (jar, id),
        None => {
            let id = SessionId::generate();
            let jar = jar.add(session_cookie(name, &id));
            (jar, id)
        }
    }
}

/// Removes the session cookie
pub fn clear(jar: SignedCookieJar, name: &str) -> SignedCookieJar {
    jar.remove(Cookie::build((name.to_string(), "")).path("/"))
}

fn session_cookie(name: &str, id: &SessionId) -> Cookie<'static> {
    Cookie::build((name.to_string(), id.as_str().to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
