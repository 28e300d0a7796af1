//! Application configuration structs
//!
//! Loads configuration from environment variables, optionally layered over a config file.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
    /// Verbose logging regardless of environment
    pub debug: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
            debug: false,
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// CORS configuration
///
/// An empty origin list allows any origin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// JWT configuration
///
/// Without a secret, connections are accepted anonymously and get a generated owner id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: Option<String>,
}

/// Per-session limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive protocol failures before a session is closed (0 disables)
    pub attempts_allowed: u32,
    /// Read deadline in seconds (0 disables)
    pub idle_timeout_secs: u64,
    /// Per-subscriber buffer of the hook bus
    pub hook_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attempts_allowed: default_attempts_allowed(),
            idle_timeout_secs: default_idle_timeout_secs(),
            hook_buffer: default_hook_buffer(),
        }
    }
}

impl SessionConfig {
    /// Read deadline, if one is configured
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

// Default value functions
fn default_app_name() -> String {
    "socket-server".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_attempts_allowed() -> u32 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_hook_buffer() -> usize {
    256
}

/// Parse an optional environment variable, rejecting values that do not parse
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

fn parse_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue(name, raw)),
        },
        Err(_) => Ok(None),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional; missing ones fall back to defaults.
    ///
    /// # Errors
    /// Returns an error if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file (JSON, TOML, YAML...) with `SOCKET__SECTION__KEY`
    /// environment overrides, e.g. `SOCKET__SERVER__PORT=4000`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix("SOCKET")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|source| ConfigError::file(path, source))?;

        settings
            .try_deserialize()
            .map_err(|source| ConfigError::file(path, source))
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(name) = env::var("APP_NAME") {
            self.app.name = name;
        }
        if let Some(environment) = parse_var::<Environment>("APP_ENV")? {
            self.app.env = environment;
        }
        if let Some(debug) = parse_bool("APP_DEBUG")? {
            self.app.debug = debug;
        }

        if let Ok(host) = env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var("SERVER_PORT")? {
            self.server.port = port;
        }

        if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = parse_list(&origins);
        }

        if let Ok(secret) = env::var("JWT_SECRET") {
            self.jwt.secret = (!secret.is_empty()).then_some(secret);
        }

        if let Some(attempts) = parse_var("SESSION_ATTEMPTS_ALLOWED")? {
            self.session.attempts_allowed = attempts;
        }
        if let Some(secs) = parse_var("SESSION_IDLE_TIMEOUT_SECS")? {
            self.session.idle_timeout_secs = secs;
        }
        if let Some(buffer) = parse_var("SESSION_HOOK_BUFFER")? {
            self.session.hook_buffer = buffer;
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Cannot load config file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: ::config::ConfigError,
    },
}

impl ConfigError {
    fn file(path: &Path, source: ::config::ConfigError) -> Self {
        Self::File {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("Production".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("staging".parse::<Environment>(), Ok(Environment::Staging));
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Staging.is_production());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(config.address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "socket-server");
        assert_eq!(config.server.address(), "127.0.0.1:3000");
        assert!(config.jwt.secret.is_none());
        assert!(config.cors.allowed_origins.is_empty());
        assert_eq!(config.session.attempts_allowed, 10);
        assert_eq!(config.session.idle_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_zero_idle_timeout_disables_deadline() {
        let session = SessionConfig {
            idle_timeout_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(session.idle_timeout(), None);
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn test_from_file_partial_json() {
        let path = write_temp(
            "socket-config.json",
            r#"{
                "app": { "debug": true },
                "server": { "port": 4100 },
                "session": { "attempts_allowed": 3 }
            }"#,
        );

        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(config.app.debug);
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.session.attempts_allowed, 3);
        assert_eq!(config.session.hook_buffer, 256);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::File { ref path, .. } if path.ends_with("here.json")));
        assert!(std::error::Error::source(&err).is_some());
    }
}
