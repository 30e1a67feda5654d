//! OAuth constants for Google accounts and the Drive API

/// Google OAuth authorization endpoint
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth token exchange endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth token revocation endpoint
pub const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Per-file Drive access: files created or opened by this application
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Access tokens are treated as expired this many seconds before `expiry`
pub const EXPIRY_BUFFER_SECS: i64 = 5 * 60;

/// How long an authorization request may wait for its callback
pub const PENDING_AUTHORIZATION_TTL_SECS: i64 = 10 * 60;

/// Upper bound for any single call to the token or revoke endpoint
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 15;

/// Sessions idle longer than this are discarded
pub const DEFAULT_SESSION_IDLE_SECS: i64 = 24 * 60 * 60;

/// Provider error code for revoked, expired or already-used grants
pub const INVALID_GRANT: &str = "invalid_grant";
