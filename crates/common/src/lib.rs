//! Shared configuration for the cloud drive workspace.

pub mod config;

pub use config::{Config, ConfigError};
