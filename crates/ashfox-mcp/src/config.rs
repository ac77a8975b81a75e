//! Configuration for the ashfox MCP server.

use std::time::Duration;

/// Transport and protocol constants.
pub mod protocol {
    use std::time::Duration;

    /// Maximum accepted request body, in bytes.
    pub const MAX_BODY_BYTES: usize = 5_000_000;

    /// Read timeout for a single request body.
    pub const BODY_READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// Interval between SSE keep-alive comments.
    pub const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

    /// An SSE write blocked longer than this closes the connection.
    pub const SSE_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Idle session lifetime before pruning.
    pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

    /// Minimum spacing between prune passes.
    pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

    /// CORS preflight cache lifetime, in seconds.
    pub const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

    /// Protocol versions the server understands, newest first.
    pub const SUPPORTED_VERSIONS: &[&str] = &["2025-11-25", "2025-06-18", "2024-11-05"];

    /// Version negotiated when the client requests an unknown one.
    pub const DEFAULT_VERSION: &str = "2025-06-18";

    /// Session id request/response header.
    pub const SESSION_HEADER: &str = "Mcp-Session-Id";

    /// Optional protocol version header.
    pub const VERSION_HEADER: &str = "Mcp-Protocol-Version";
}

/// Default bounds on project state.
pub mod limits {
    /// Largest accepted texture edge, in pixels.
    pub const MAX_TEXTURE_SIZE: u32 = 4096;

    /// Total cube cap per project.
    pub const MAX_CUBES: usize = 2048;

    /// Longest accepted animation clip, in seconds.
    pub const MAX_ANIMATION_SECONDS: f64 = 600.0;

    /// Tolerance when comparing bucketed keyframe times.
    pub const TIME_EPSILON: f64 = 1e-4;

    /// Keyframe time bucket width, in seconds.
    pub const BUCKET_PRECISION: f64 = 0.01;
}

/// Bounds enforced on every mutation.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Largest accepted texture edge, in pixels.
    pub max_texture_size: u32,

    /// Total cube cap per project.
    pub max_cubes: usize,

    /// Longest accepted animation clip, in seconds.
    pub max_animation_seconds: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_texture_size: limits::MAX_TEXTURE_SIZE,
            max_cubes: limits::MAX_CUBES,
            max_animation_seconds: limits::MAX_ANIMATION_SECONDS,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Normalized base path the MCP endpoint is served under.
    pub base_path: String,

    /// Optional bearer token required on every request.
    pub auth_token: Option<String>,

    /// Idle session lifetime. Zero disables pruning.
    pub session_ttl: Duration,

    /// Whether mutating tools must carry `ifRevision`.
    pub require_revision: bool,

    /// Project state bounds.
    pub limits: Limits,
}

impl Config {
    /// Default bind host.
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";

    /// Default bind port.
    pub const DEFAULT_PORT: u16 = 8787;

    /// Default base path.
    pub const DEFAULT_PATH: &'static str = "/mcp";

    /// Create a configuration from raw CLI/env inputs.
    ///
    /// # Errors
    ///
    /// Returns an error when the host is empty or the path normalizes to
    /// nothing.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        path: &str,
        auth_token: Option<String>,
    ) -> anyhow::Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        let base_path = normalize_base_path(path)?;
        Ok(Self {
            host,
            port,
            base_path,
            auth_token: auth_token.filter(|t| !t.is_empty()),
            session_ttl: protocol::SESSION_TTL,
            require_revision: true,
            limits: Limits::default(),
        })
    }

    /// Create configuration from `ASHFOX_*` environment variables,
    /// keeping defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error when `ASHFOX_PORT` is not a valid port number or the
    /// path is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let host =
            std::env::var("ASHFOX_HOST").unwrap_or_else(|_| Self::DEFAULT_HOST.to_string());
        let port = match std::env::var("ASHFOX_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                anyhow::anyhow!("ASHFOX_PORT must be a port number, got {raw:?}")
            })?,
            Err(_) => Self::DEFAULT_PORT,
        };
        let path = std::env::var("ASHFOX_PATH").unwrap_or_else(|_| Self::DEFAULT_PATH.to_string());
        Self::new(host, port, &path, None)
    }

    /// Create a test configuration with pruning disabled.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: 0,
            base_path: Self::DEFAULT_PATH.to_string(),
            auth_token: None,
            session_ttl: Duration::ZERO,
            require_revision: true,
            limits: Limits::default(),
        }
    }

    /// Whether a bearer token is required.
    #[must_use]
    pub const fn requires_auth(&self) -> bool {
        self.auth_token.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOST, Self::DEFAULT_PORT, Self::DEFAULT_PATH, None)
            .expect("defaults are valid")
    }
}

/// Normalize a base path: leading slash, no trailing slash unless root.
fn normalize_base_path(path: &str) -> anyhow::Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        anyhow::bail!("base path must not be empty");
    }
    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.contains(char::is_whitespace) {
        anyhow::bail!("base path must not contain whitespace, got {normalized:?}");
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8787);
        assert_eq!(config.base_path, "/mcp");
        assert!(!config.requires_auth());
        assert!(config.require_revision);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_base_path("mcp").unwrap(), "/mcp");
        assert_eq!(normalize_base_path("/mcp/").unwrap(), "/mcp");
        assert_eq!(normalize_base_path("/").unwrap(), "/");
        assert_eq!(normalize_base_path("/api/mcp").unwrap(), "/api/mcp");
        assert!(normalize_base_path("  ").is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(Config::new("", 8787, "/mcp", None).is_err());
    }

    #[test]
    fn test_empty_token_treated_as_absent() {
        let config = Config::new("127.0.0.1", 8787, "/mcp", Some(String::new())).unwrap();
        assert!(!config.requires_auth());
    }
}
