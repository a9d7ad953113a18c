//! Configuration management for Clinick
//!
//! The API base URL, dashboard password and session token all live here so
//! deployments can override them from a file or the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Dashboard login configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Dashboard polling and storage configuration
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Report submission configuration
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// Dashboard login configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Password accepted by `login`
    #[serde(default = "default_password")]
    pub password: String,

    /// Token stored on login and expected by the dashboard
    #[serde(default = "default_session_token")]
    pub session_token: String,
}

/// Dashboard polling and storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Directory holding the session and alarmed-ID files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Session file name (relative to `data_dir`)
    #[serde(default = "default_session_file")]
    pub session_file: String,

    /// Alarmed-ID file name (relative to `data_dir`)
    #[serde(default = "default_alarmed_file")]
    pub alarmed_file: String,

    /// Capacity of the pending acknowledgment queue
    #[serde(default = "default_ack_queue_size")]
    pub ack_queue_size: usize,

    /// How often a ringing alarm repeats, in milliseconds
    #[serde(default = "default_siren_repeat")]
    pub siren_repeat_ms: u64,
}

/// Report submission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// How long the confirmation stays visible, in milliseconds
    #[serde(default = "default_confirmation")]
    pub confirmation_ms: u64,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory exports are written to when no output path is given
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_password() -> String {
    "clinick123".to_string()
}

fn default_session_token() -> String {
    "clinick-token".to_string()
}

const fn default_poll_interval() -> u64 {
    5_000
}

fn default_data_dir() -> PathBuf {
    directories::UserDirs::new()
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.home_dir().to_path_buf())
        .join(".clinick")
}

fn default_session_file() -> String {
    "session".to_string()
}

fn default_alarmed_file() -> String {
    "alarmed.json".to_string()
}

const fn default_ack_queue_size() -> usize {
    64
}

const fn default_siren_repeat() -> u64 {
    1_500
}

const fn default_confirmation() -> u64 {
    3_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`]
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password: default_password(),
            session_token: default_session_token(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            data_dir: default_data_dir(),
            session_file: default_session_file(),
            alarmed_file: default_alarmed_file(),
            ack_queue_size: default_ack_queue_size(),
            siren_repeat_ms: default_siren_repeat(),
        }
    }
}

impl DashboardConfig {
    /// Poll interval as a [`Duration`]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Siren repeat interval as a [`Duration`]
    #[must_use]
    pub const fn siren_repeat(&self) -> Duration {
        Duration::from_millis(self.siren_repeat_ms)
    }

    /// Full path of the session file
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(&self.session_file)
    }

    /// Full path of the alarmed-ID file
    #[must_use]
    pub fn alarmed_ids_path(&self) -> PathBuf {
        self.data_dir.join(&self.alarmed_file)
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            confirmation_ms: default_confirmation(),
        }
    }
}

impl SubmissionConfig {
    /// Confirmation lifetime as a [`Duration`]
    #[must_use]
    pub const fn confirmation(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Apply command line overrides on top of the configured values
    #[must_use]
    pub fn with_overrides(&self, level: Option<&str>, format: Option<&str>, json: bool) -> Self {
        Self {
            level: level.map_or_else(|| self.level.clone(), str::to_string),
            format: if json {
                "json".to_string()
            } else {
                format.map_or_else(|| self.format.clone(), str::to_string)
            },
        }
    }

    /// Whether log lines are emitted as JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

const REDACTED: &str = "<redacted>";

impl Config {
    /// Copy with the password and session token masked, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.auth.password = REDACTED.to_string();
        config.auth.session_token = REDACTED.to_string();
        config
    }

    /// Load configuration from an optional `clinick.*` file and `CLINICK__*`
    /// environment variables
    ///
    /// Nested keys use a double underscore, e.g. `CLINICK__API__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("clinick").required(false))
            .add_source(
                config::Environment::with_prefix("CLINICK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })?;

        config
            .try_deserialize()
            .map_err(|e| crate::Error::Configuration {
                message: e.to_string(),
            })
    }

    /// Load configuration from an explicit TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::Configuration {
            message: format!("Failed to read config file {}: {e}", path.display()),
        })?;

        toml::from_str(&content).map_err(|e| crate::Error::Configuration {
            message: format!("Failed to parse config file {}: {e}", path.display()),
        })
    }

    /// Render the resolved configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Configuration {
            message: format!("Failed to serialize configuration: {e}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://localhost:5000");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.auth.password, "clinick123");
        assert_eq!(config.auth.session_token, "clinick-token");
        assert_eq!(config.dashboard.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.dashboard.ack_queue_size, 64);
        assert_eq!(config.submission.confirmation(), Duration::from_secs(3));
        assert_eq!(config.logging.level, "info");
        assert!(config.dashboard.data_dir.ends_with(".clinick"));
    }

    #[test]
    fn test_storage_paths_join_data_dir() {
        let dashboard = DashboardConfig {
            data_dir: PathBuf::from("/var/lib/clinick"),
            ..DashboardConfig::default()
        };

        assert_eq!(
            dashboard.session_path(),
            PathBuf::from("/var/lib/clinick/session")
        );
        assert_eq!(
            dashboard.alarmed_ids_path(),
            PathBuf::from("/var/lib/clinick/alarmed.json")
        );
    }

    #[test]
    fn test_partial_config_deserialization() {
        let json_str = r#"{
            "api": {"base_url": "https://clinick-backend.example.com"},
            "dashboard": {"poll_interval_ms": 1000}
        }"#;

        let config: Config = serde_json::from_str(json_str).unwrap();

        assert_eq!(config.api.base_url, "https://clinick-backend.example.com");
        assert_eq!(config.api.request_timeout_seconds, 30);
        assert_eq!(config.dashboard.poll_interval_ms, 1000);
        assert_eq!(config.dashboard.alarmed_file, "alarmed.json");
        assert_eq!(config.auth.session_token, "clinick-token");
    }

    #[test]
    fn test_from_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clinick.toml");
        std::fs::write(
            &path,
            r#"
[auth]
password = "s3cret"
session_token = "tok"

[submission]
confirmation_ms = 500
"#,
        )
        .unwrap();

        let config = Config::from_toml_file(&path).unwrap();

        assert_eq!(config.auth.password, "s3cret");
        assert_eq!(config.auth.session_token, "tok");
        assert_eq!(config.submission.confirmation_ms, 500);
        assert_eq!(config.api.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_from_toml_file_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();

        let error = Config::from_toml_file(&path).unwrap_err();
        assert!(error.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_logging_falls_back_to_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
        };

        let resolved = logging.with_overrides(None, None, false);
        assert_eq!(resolved.level, "debug");
        assert!(resolved.is_json());

        let resolved = logging.with_overrides(Some("warn"), Some("pretty"), false);
        assert_eq!(resolved.level, "warn");
        assert!(!resolved.is_json());

        let resolved = LoggingConfig::default().with_overrides(None, Some("pretty"), true);
        assert!(resolved.is_json());
    }

    #[test]
    fn test_logging_section_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clinick.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        let resolved = config.logging.with_overrides(None, None, false);

        assert_eq!(resolved.level, "debug");
        assert_eq!(resolved.format, "pretty");
    }

    #[test]
    fn test_redacted_masks_credentials() {
        let mut config = Config::default();
        config.auth.password = "s3cret".to_string();
        config.auth.session_token = "tok-123".to_string();

        let rendered = config.redacted().to_toml().unwrap();

        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("http://localhost:5000"));
        assert_eq!(config.auth.password, "s3cret");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.api.base_url, config.api.base_url);
        assert_eq!(parsed.dashboard.data_dir, config.dashboard.data_dir);
    }
}
