// Configuration for the proxy server
//
// Configuration is loaded in order of precedence:
// 1. Environment variables (highest priority)
// 2. Config file (~/.config/openrouter-proxy/config.toml)
// 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::path::PathBuf;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port range scanned when no fixed port is configured
pub const DEFAULT_PORT_RANGE: (u16, u16) = (8765, 8774);

/// Log file rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogRotation::Daily => "daily",
            LogRotation::Hourly => "hourly",
            LogRotation::Never => "never",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Write logs to rotating files in addition to stdout
    pub file_enabled: bool,

    /// Directory for log files
    pub file_dir: PathBuf,

    /// Rotation policy for log files
    pub file_rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs"),
            file_rotation: LogRotation::Daily,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind the proxy server to (loopback only by default)
    pub bind_host: String,

    /// Fixed port to bind; when None, `port_range` is scanned for a free port
    pub port: Option<u16>,

    /// Inclusive port range scanned when no fixed port is set
    pub port_range: (u16, u16),

    /// OpenRouter API base URL
    pub api_url: String,

    /// OpenRouter API key (OPENROUTER_API_KEY env var or config file)
    pub api_key: Option<String>,

    /// HTTP-Referer attribution header sent to OpenRouter
    pub http_referer: String,

    /// X-Title attribution header sent to OpenRouter
    pub app_title: String,

    /// Connect timeout for upstream calls, in seconds
    pub connect_timeout_secs: u64,

    /// Overall request timeout for upstream calls, in seconds.
    /// Also bounds how long an unresponsive SSE stream can pin a task.
    pub request_timeout_secs: u64,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
struct FileLogging {
    level: Option<String>,
    file_enabled: Option<bool>,
    file_dir: Option<String>,
    file_rotation: Option<String>,
}

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    bind_host: Option<String>,
    port: Option<u16>,
    port_range: Option<[u16; 2]>,
    api_url: Option<String>,
    api_key: Option<String>,
    http_referer: Option<String>,
    app_title: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,

    /// Optional [logging] section
    logging: Option<FileLogging>,
}

impl Config {
    /// Get the config file path: ~/.config/openrouter-proxy/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| {
            p.join(".config")
                .join("openrouter-proxy")
                .join("config.toml")
        })
    }

    /// Create config template if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        // Don't overwrite existing config
        if path.exists() {
            return;
        }

        // Create parent directory
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        let template = r#"# openrouter-proxy configuration
# Uncomment and modify options as needed

# Host to bind the local proxy to (default: 127.0.0.1)
# bind_host = "127.0.0.1"

# Fixed port. When unset, the port_range below is scanned for a free port.
# port = 8765

# Inclusive port range scanned when no fixed port is set
# port_range = [8765, 8774]

# OpenRouter API base URL
# api_url = "https://openrouter.ai/api/v1"

# OpenRouter API key (OPENROUTER_API_KEY env var takes precedence)
# api_key = "sk-or-v1-..."

# Attribution headers sent with upstream requests
# http_referer = "http://localhost"
# app_title = "OpenRouter AI Assistant Proxy"

# Upstream timeouts in seconds
# connect_timeout_secs = 10
# request_timeout_secs = 300

# Logging configuration
# [logging]
# level = "info"          # trace, debug, info, warn, error (RUST_LOG overrides)
# file_enabled = false    # Also write logs to rotating files
# file_dir = "./logs"
# file_rotation = "daily" # daily, hourly, never
"#;

        // Write template (ignore errors - config is optional)
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                FileConfig::default()
            }),
            Err(_) => FileConfig::default(), // File doesn't exist, use defaults
        }
    }

    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        let port_line = match self.port {
            Some(port) => format!("port = {}", port),
            None => "# port = 8765".to_string(),
        };

        format!(
            r#"# openrouter-proxy configuration

# Host to bind the local proxy to
bind_host = "{host}"

# Fixed port (uncomment to pin; otherwise port_range is scanned)
{port_line}

# Inclusive port range scanned when no fixed port is set
port_range = [{range_start}, {range_end}]

# OpenRouter API base URL
api_url = "{api_url}"

# Attribution headers sent with upstream requests
http_referer = "{referer}"
app_title = "{title}"

# Upstream timeouts in seconds
connect_timeout_secs = {connect_timeout}
request_timeout_secs = {request_timeout}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
file_enabled = {file_enabled}
file_dir = "{file_dir}"
file_rotation = "{file_rotation}"
"#,
            host = self.bind_host,
            port_line = port_line,
            range_start = self.port_range.0,
            range_end = self.port_range.1,
            api_url = self.api_url,
            referer = self.http_referer,
            title = self.app_title,
            connect_timeout = self.connect_timeout_secs,
            request_timeout = self.request_timeout_secs,
            log_level = self.logging.level,
            file_enabled = self.logging.file_enabled,
            file_dir = self.logging.file_dir.display(),
            file_rotation = self.logging.file_rotation.as_str(),
        )
    }

    /// Load configuration: file -> env vars -> defaults
    pub fn from_env() -> Self {
        let file = Self::load_file_config();

        // Bind host: env > file > default
        let bind_host = std::env::var("OPENROUTER_PROXY_HOST")
            .ok()
            .or(file.bind_host)
            .unwrap_or_else(|| "127.0.0.1".to_string());

        // Fixed port: env > file > none (scan the range)
        let port = std::env::var("OPENROUTER_PROXY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.port);

        let port_range = file
            .port_range
            .map(|[start, end]| (start, end))
            .unwrap_or(DEFAULT_PORT_RANGE);

        // API URL: env > file > default
        let api_url = std::env::var("OPENROUTER_API_URL")
            .ok()
            .or(file.api_url)
            .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string());

        // API key: env > file > unset (requests fail with 401 until configured)
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or(file.api_key);

        let http_referer = file
            .http_referer
            .unwrap_or_else(|| "http://localhost".to_string());

        let app_title = file
            .app_title
            .unwrap_or_else(|| "OpenRouter AI Assistant Proxy".to_string());

        let connect_timeout_secs = file.connect_timeout_secs.unwrap_or(10);
        let request_timeout_secs = file.request_timeout_secs.unwrap_or(300);

        // Logging settings: file config only (RUST_LOG env var handled in main.rs)
        let file_logging = file.logging.unwrap_or_default();
        let logging = LoggingConfig {
            level: file_logging.level.unwrap_or_else(|| "info".to_string()),
            file_enabled: file_logging.file_enabled.unwrap_or(false),
            file_dir: file_logging
                .file_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs")),
            file_rotation: file_logging
                .file_rotation
                .as_deref()
                .map(LogRotation::parse)
                .unwrap_or(LogRotation::Daily),
        };

        Self {
            bind_host,
            port,
            port_range,
            api_url,
            api_key,
            http_referer,
            app_title,
            connect_timeout_secs,
            request_timeout_secs,
            logging,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: None,
            port_range: DEFAULT_PORT_RANGE,
            api_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            http_referer: "http://localhost".to_string(),
            app_title: "OpenRouter AI Assistant Proxy".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
            logging: LoggingConfig::default(),
        }
    }
}
