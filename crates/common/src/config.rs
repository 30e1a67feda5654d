use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Google's OAuth authorization endpoint
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's OAuth token endpoint
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google's OAuth revocation endpoint
pub const GOOGLE_REVOKE_URI: &str = "https://oauth2.googleapis.com/revoke";

/// Drive scope limited to files created or opened by this app
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Minimum length of `SECRET_KEY` for signing session cookies
pub const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("SECRET_KEY must be at least 32 bytes")]
    SecretKeyTooShort,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub session: SessionConfig,
    pub drive: DriveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// OAuth client registration for the Google Cloud project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub revoke_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Send `prompt=consent` so repeat grants still issue a refresh token
    pub prompt_consent: bool,
    /// Upper bound for a single token/revoke request
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key material for signing the session cookie
    pub secret_key: Option<String>,
    pub cookie_name: String,
    pub backend: SessionBackend,
    /// Directory for the file backend; defaults to the platform data dir
    pub directory: Option<PathBuf>,
    pub idle_timeout_secs: u64,
    /// How long a started authorization may wait for its callback
    pub pending_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub api_base: String,
    pub upload_base: String,
    pub max_upload_bytes: usize,
    pub share_role: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            revoke_uri: GOOGLE_REVOKE_URI.to_string(),
            redirect_uri: "http://localhost:8080/oauth2callback".to_string(),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            prompt_consent: true,
            request_timeout_secs: 15,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            cookie_name: "drive_session".to_string(),
            backend: SessionBackend::Memory,
            directory: None,
            idle_timeout_secs: 24 * 60 * 60,
            pending_timeout_secs: 10 * 60,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
            max_upload_bytes: 100 * 1024 * 1024,
            share_role: "writer".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration: defaults, then the TOML file, then the process
    /// environment, then validation.
    ///
    /// With no explicit path, `config.toml` in the platform config directory
    /// is used when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!("No config file at {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML config file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Applies the environment variable overrides used by the deployment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_overrides: [(&str, &mut String); 6] = [
            ("GOOGLE_DRIVE_CLIENT_ID", &mut self.google.client_id),
            ("GOOGLE_DRIVE_CLIENT_SECRET", &mut self.google.client_secret),
            ("GOOGLE_AUTH_URI", &mut self.google.auth_uri),
            ("GOOGLE_TOKEN_URI", &mut self.google.token_uri),
            ("GOOGLE_DRIVE_REDIRECT_URI", &mut self.google.redirect_uri),
            ("HOST", &mut self.server.host),
        ];
        for (key, slot) in string_overrides {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                debug!("Config override from {}", key);
                *slot = value;
            }
        }

        if let Some(secret) = lookup("SECRET_KEY").filter(|v| !v.is_empty()) {
            self.session.secret_key = Some(secret);
        }

        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT",
                value: port,
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.google.client_id.is_empty() {
            return Err(ConfigError::Missing("google.client_id"));
        }
        if self.google.client_secret.is_empty() {
            return Err(ConfigError::Missing("google.client_secret"));
        }
        if self.google.redirect_uri.is_empty() {
            return Err(ConfigError::Missing("google.redirect_uri"));
        }
        if self.google.scopes.is_empty() {
            return Err(ConfigError::Missing("google.scopes"));
        }
        if let Some(secret) = &self.session.secret_key {
            if secret.len() < MIN_SECRET_KEY_LEN {
                return Err(ConfigError::SecretKeyTooShort);
            }
        }
        Ok(())
    }
}

/// Platform config file location, e.g. `~/.config/cloud-drive/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform data directory used by the file session backend
pub fn default_data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "clouddrive", "cloud-drive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_use_drive_file_scope() {
        let config = Config::default();
        assert_eq!(config.google.scopes, vec![DRIVE_FILE_SCOPE.to_string()]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert!(config.google.prompt_consent);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("GOOGLE_DRIVE_CLIENT_ID", "id"),
                ("GOOGLE_DRIVE_CLIENT_SECRET", "secret"),
                ("GOOGLE_DRIVE_REDIRECT_URI", "https://app.example/oauth2callback"),
                ("PORT", "9090"),
            ]))
            .unwrap();

        assert_eq!(config.google.client_id, "id");
        assert_eq!(config.google.client_secret, "secret");
        assert_eq!(config.google.redirect_uri, "https://app.example/oauth2callback");
        assert_eq!(config.server.port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "PORT", .. }));
    }

    #[test]
    fn test_validate_requires_client_credentials() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("google.client_id"))
        ));
    }

    #[test]
    fn test_short_secret_key_rejected() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("GOOGLE_DRIVE_CLIENT_ID", "id"),
                ("GOOGLE_DRIVE_CLIENT_SECRET", "secret"),
                ("SECRET_KEY", "too-short"),
            ]))
            .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::SecretKeyTooShort)));
    }

    #[test]
    fn test_from_file_partial_sections() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 3000

[google]
client_id = "file-id"
client_secret = "file-secret"

[session]
backend = "file"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.google.client_id, "file-id");
        assert_eq!(config.google.token_uri, GOOGLE_TOKEN_URI);
        assert_eq!(config.session.backend, SessionBackend::File);
        assert_eq!(config.drive.share_role, "writer");
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
