//! Cloud Drive web server
//!
//! Signs users in with Google OAuth2 and lets them upload, download, delete
//! and share files in their Drive.

pub mod error;
pub mod guard;
pub mod pages;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;

pub use error::AppError;
pub use server::{ServerHandle, create_router, run_server_blocking, start_server};
pub use state::AppState;
