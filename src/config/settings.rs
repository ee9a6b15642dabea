//! Configuration settings for the content gateway.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::auth::MAX_NONCE_TTL;
use crate::error::GateError;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// The only chain id signatures are accepted for.
    pub chain_id: u64,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Oldest accepted nonce, in seconds.
    #[serde(default = "default_max_nonce_age")]
    pub max_nonce_age_seconds: u64,
    /// Tolerated clock difference for future-dated nonces, in seconds.
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew_seconds: u64,
    /// How long consumed nonces are remembered. Must exceed age plus skew.
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_seconds: u64,
    /// Maximum number of remembered nonces.
    #[serde(default = "default_nonce_cache_capacity")]
    pub nonce_cache_capacity: usize,
    /// Interval of the expired-nonce sweep, in seconds.
    #[serde(default = "default_nonce_cleanup_interval")]
    pub nonce_cleanup_interval_seconds: u64,
    /// Accept nonces that carry no issuance time.
    #[serde(default)]
    pub accept_opaque_nonces: bool,
    /// Include the denial reason in 403 responses.
    #[serde(default)]
    pub expose_denial_reasons: bool,
    /// Maximum requests per client address per window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: usize,
    /// Rate limit window in seconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: u64,
    /// Maximum number of clients the rate limiter tracks at once.
    #[serde(default = "default_rate_limit_max_clients")]
    pub rate_limit_max_clients: usize,
}

/// Content store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Root directory holding `<owner>/<area>/<file>`.
    pub root: PathBuf,
    /// Read size for streamed content, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_connections: usize,
    /// Time allowed for authorization plus listing or opening, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Longest pause between streamed chunks, in seconds.
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_seconds: u64,
    /// Time allowed for a client to send its request headers, in seconds.
    #[serde(default = "default_header_read_timeout")]
    pub header_read_timeout_seconds: u64,
    /// Time in-flight connections get to finish on shutdown, in seconds.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_max_nonce_age() -> u64 {
    300
}

fn default_max_clock_skew() -> u64 {
    30
}

// One second past the acceptance window: freshness is checked in whole
// seconds, so a nonce is still fresh during the window's final second.
fn default_nonce_ttl() -> u64 {
    default_max_nonce_age() + default_max_clock_skew() + 1
}

fn default_nonce_cache_capacity() -> usize {
    100_000
}

fn default_nonce_cleanup_interval() -> u64 {
    60
}

fn default_rate_limit_requests() -> usize {
    120
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_max_clients() -> usize {
    65_536
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_concurrent() -> usize {
    256
}

fn default_request_timeout() -> u64 {
    30
}

fn default_stream_idle_timeout() -> u64 {
    30
}

fn default_header_read_timeout() -> u64 {
    10
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/gated-content/audit.log")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_nonce_age_seconds: default_max_nonce_age(),
            max_clock_skew_seconds: default_max_clock_skew(),
            nonce_ttl_seconds: default_nonce_ttl(),
            nonce_cache_capacity: default_nonce_cache_capacity(),
            nonce_cleanup_interval_seconds: default_nonce_cleanup_interval(),
            accept_opaque_nonces: false,
            expose_denial_reasons: false,
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_seconds: default_rate_limit_window(),
            rate_limit_max_clients: default_rate_limit_max_clients(),
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

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_connections: default_max_concurrent(),
            request_timeout_seconds: default_request_timeout(),
            stream_idle_timeout_seconds: default_stream_idle_timeout(),
            header_read_timeout_seconds: default_header_read_timeout(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GateError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| match e {
            GateError::Config { message } => GateError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, GateError> {
        let settings: Settings = toml::from_str(content).map_err(|e| GateError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), GateError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(config_error(format!(
                "Invalid log level '{}'. Valid levels: {:?}",
                self.logging.level, valid_levels
            )));
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(config_error(format!(
                "Invalid log format '{}'. Valid formats: {:?}",
                self.logging.format, valid_formats
            )));
        }

        // A nonce forgotten before it expires could be replayed.
        let security = &self.security;
        let window = security
            .max_nonce_age_seconds
            .checked_add(security.max_clock_skew_seconds)
            .ok_or_else(|| {
                config_error(
                    "max_nonce_age_seconds + max_clock_skew_seconds overflows".to_string(),
                )
            })?;
        if security.nonce_ttl_seconds <= window {
            return Err(config_error(format!(
                "nonce_ttl_seconds ({}) must be greater than max_nonce_age_seconds + max_clock_skew_seconds ({})",
                security.nonce_ttl_seconds, window
            )));
        }
        if security.nonce_ttl_seconds > MAX_NONCE_TTL.as_secs() {
            return Err(config_error(format!(
                "nonce_ttl_seconds ({}) must not exceed {}",
                security.nonce_ttl_seconds,
                MAX_NONCE_TTL.as_secs()
            )));
        }

        let positive = [
            ("security.nonce_cache_capacity", security.nonce_cache_capacity as u64),
            ("security.nonce_cleanup_interval_seconds", security.nonce_cleanup_interval_seconds),
            ("security.rate_limit_requests", security.rate_limit_requests as u64),
            ("security.rate_limit_window_seconds", security.rate_limit_window_seconds),
            ("security.rate_limit_max_clients", security.rate_limit_max_clients as u64),
            ("content.chunk_size", self.content.chunk_size as u64),
            ("limits.max_concurrent_connections", self.limits.max_concurrent_connections as u64),
            ("limits.request_timeout_seconds", self.limits.request_timeout_seconds),
            ("limits.stream_idle_timeout_seconds", self.limits.stream_idle_timeout_seconds),
            ("limits.header_read_timeout_seconds", self.limits.header_read_timeout_seconds),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(config_error(format!("{} must be greater than zero", name)));
        }

        Ok(())
    }
}

fn config_error(message: String) -> GateError {
    GateError::Config { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
        [chain]
        chain_id = 42

        [content]
        root = "/srv/gated"
    "#;

    #[test]
    fn test_default_values() {
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_nonce_ttl(), 331);
        assert_eq!(default_rate_limit_max_clients(), 65_536);
    }

    #[test]
    fn test_minimal_config() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.chain.chain_id, 42);
        assert_eq!(settings.content.root, PathBuf::from("/srv/gated"));
        assert_eq!(settings.security.max_nonce_age_seconds, 300);
        assert!(!settings.security.accept_opaque_nonces);
        assert!(!settings.security.expose_denial_reasons);
        assert_eq!(settings.server.bind_address.port(), 8080);
        assert!(settings.audit.enabled);
    }

    #[test]
    fn test_missing_chain_rejected() {
        let result = Settings::parse("[content]\nroot = \"/srv\"\n");
        assert!(matches!(result, Err(GateError::Config { .. })));
    }

    #[test]
    fn test_short_nonce_ttl_rejected() {
        let config = format!("{}\n[security]\nnonce_ttl_seconds = 60\n", MINIMAL);
        let err = Settings::parse(&config).unwrap_err();
        assert!(err.to_string().contains("nonce_ttl_seconds"));
    }

    #[test]
    fn test_nonce_ttl_must_outlast_final_fresh_second() {
        let equal = format!("{}\n[security]\nnonce_ttl_seconds = 330\n", MINIMAL);
        let err = Settings::parse(&equal).unwrap_err();
        assert!(err.to_string().contains("greater than"));

        let past = format!("{}\n[security]\nnonce_ttl_seconds = 331\n", MINIMAL);
        assert_eq!(Settings::parse(&past).unwrap().security.nonce_ttl_seconds, 331);
    }

    #[test]
    fn test_overflowing_nonce_window_rejected() {
        let mut settings = Settings::parse(MINIMAL).unwrap();
        settings.security.max_nonce_age_seconds = u64::MAX;
        settings.security.max_clock_skew_seconds = 1;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_oversized_nonce_ttl_rejected() {
        let config = format!("{}\n[security]\nnonce_ttl_seconds = {}\n", MINIMAL, i64::MAX);
        let err = Settings::parse(&config).unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let config = format!("{}\n[logging]\nformat = \"xml\"\n", MINIMAL);
        assert!(Settings::parse(&config).is_err());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = format!("{}\n[limits]\nmax_concurrent_connections = 0\n", MINIMAL);
        let err = Settings::parse(&config).unwrap_err();
        assert!(err.to_string().contains("max_concurrent_connections"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", MINIMAL).unwrap();
        writeln!(file, "[server]\nbind_address = \"0.0.0.0:9000\"").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.server.bind_address.port(), 9000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/gateway.toml").unwrap_err();
        assert!(matches!(err, GateError::Config { .. }));
    }
}
