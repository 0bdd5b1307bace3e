//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables (optionally via a `.env` file) or
//! defaults. The tool registry never reads configuration itself; individual
//! tools receive the sections they need when they are constructed.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration structure for the MCP server.
///
/// This struct contains all configurable aspects of the server, organized
/// by concern for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Security and path validation configuration.
    pub security: SecurityConfig,

    /// Database tool configuration.
    pub database: DatabaseConfig,

    /// Outbound network limits for HTTP, search and probe tools.
    pub network: NetworkConfig,

    /// External API credentials configuration.
    pub credentials: CredentialsConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

/// Configuration for security and path validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Optional root directory for path operations.
    /// If None, no path restrictions are enforced.
    /// All file system operations will be validated against this root.
    pub root_path: Option<PathBuf>,

    /// Whether to allow symlinks in path validation.
    /// If true, symlinks are followed and their targets are validated.
    /// If false, any symlink under a configured root is rejected.
    pub allow_symlinks: bool,
}

/// Configuration for the SQLite-backed database tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file. The database tool is only registered when set.
    pub path: Option<PathBuf>,

    /// Whether `query_type = "raw"` SQL is accepted.
    pub allow_raw: bool,
}

/// Limits applied by tools that reach out over the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout for HTTP fetch and web search.
    pub http_timeout_secs: u64,

    /// Response bodies are truncated beyond this many bytes.
    pub http_max_bytes: usize,

    /// User-Agent header sent with outbound requests.
    pub user_agent: String,

    /// JSON instant-answer endpoint used by web search.
    pub search_endpoint: String,

    /// Connect timeout for a single ping or port probe.
    pub probe_timeout_ms: u64,

    /// Upper bound on the number of ports a single scan may cover.
    pub max_scan_ports: usize,
}

/// Configuration for external API credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Optional API key appended to web search requests.
    pub search_api_key: Option<String>,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            // No root path restriction by default
            root_path: None,
            // Allow symlinks by default with validation
            allow_symlinks: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            allow_raw: true,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            http_max_bytes: 64 * 1024,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            search_endpoint: "https://api.duckduckgo.com/".to_string(),
            probe_timeout_ms: 1000,
            max_scan_ports: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "toolbox-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
            security: SecurityConfig::default(),
            database: DatabaseConfig::default(),
            network: NetworkConfig::default(),
            credentials: CredentialsConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_LOG_LEVEL`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(with_timestamps) = env_parse("MCP_LOG_TIMESTAMPS") {
            config.logging.with_timestamps = with_timestamps;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        // Load security configuration
        if let Ok(root_path) = std::env::var("MCP_ROOT_PATH") {
            config.security.root_path = Some(PathBuf::from(root_path));
            info!("Path security enabled: root directory set to {:?}", config.security.root_path);
        } else {
            warn!(
                "MCP_ROOT_PATH not set - no path restrictions active. \
                 All filesystem paths will be allowed."
            );
        }

        if let Some(allow_symlinks) = env_parse("MCP_ALLOW_SYMLINKS") {
            config.security.allow_symlinks = allow_symlinks;
            info!("Symlinks allowed: {}", config.security.allow_symlinks);
        }

        // Database tool
        if let Ok(path) = std::env::var("MCP_DATABASE_PATH") {
            info!("Database tool enabled: {}", path);
            config.database.path = Some(PathBuf::from(path));
        }
        if let Some(allow_raw) = env_parse("MCP_DATABASE_ALLOW_RAW") {
            config.database.allow_raw = allow_raw;
        }

        // Network limits
        if let Some(secs) = env_parse("MCP_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = secs;
        }
        if let Some(bytes) = env_parse("MCP_HTTP_MAX_BYTES") {
            config.network.http_max_bytes = bytes;
        }
        if let Ok(agent) = std::env::var("MCP_USER_AGENT") {
            config.network.user_agent = agent;
        }
        if let Ok(endpoint) = std::env::var("MCP_SEARCH_ENDPOINT") {
            config.network.search_endpoint = endpoint;
        }
        if let Some(ms) = env_parse("MCP_PROBE_TIMEOUT_MS") {
            config.network.probe_timeout_ms = ms;
        }
        if let Some(max) = env_parse("MCP_MAX_SCAN_PORTS") {
            config.network.max_scan_ports = max;
        }

        if let Ok(api_key) = std::env::var("MCP_SEARCH_API_KEY") {
            config.credentials.search_api_key = Some(api_key);
            info!("Search API key loaded from environment");
        }

        config
    }
}

/// Parse an environment variable, ignoring (and logging) malformed values.
pub(crate) fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
