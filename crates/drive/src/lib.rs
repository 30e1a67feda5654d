//! Google Drive v3 client
//!
//! Covers the four operations the web app needs: upload (`files.create`),
//! download (`files.get` with `alt=media`), delete (`files.delete`) and share
//! (`permissions.create`). Every call takes the caller's bearer token; the
//! client itself never stores credentials.

pub mod client;
pub mod error;

pub use client::{ByteStream, DriveClient, DriveEndpoints, DriveFile, Permission};
pub use error::{DriveError, Result};
