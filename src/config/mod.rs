mod loader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use loader::load_config;

/// Persona used when the config file does not provide one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Moulik's AI Portfolio Assistant. \
Only answer questions about Moulik Machaiah's skills, projects, education, and achievements. \
If asked something else, politely redirect.";

/// Reply for requests that arrive without a message
pub const DEFAULT_GREETING: &str = "Hi! I'm Moulik's AI Portfolio Assistant. \
Ask me about Moulik's skills, projects, education, or achievements.";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Path the widget posts to
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_port() -> u16 {
    8787
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_route() -> String {
    "/api/chat".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            route: default_route(),
        }
    }
}

/// Upstream completion API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Full chat completions URL
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for upstream connections
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
}

fn default_upstream_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.7
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_upstream_timeout(),
            api_key_env: default_api_key_env(),
            tls: None,
        }
    }
}

impl UpstreamConfig {
    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }

    /// Read the API key from the configured environment variable
    pub fn credential(&self) -> Option<Credential> {
        Credential::from_env(&self.api_key_env)
    }
}

/// Assistant persona and canned greeting
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
        }
    }
}

/// Settings for the widget-side client
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Full proxy URL the client posts to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

fn default_endpoint() -> String {
    format!("http://{}:{}{}", default_host(), default_port(), default_route())
}

fn default_client_timeout() -> u64 {
    60
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_client_timeout(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Upstream API key.
///
/// The value is only reachable through [`Credential::expose`]; `Debug` is redacted.
#[derive(Clone, PartialEq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Read a credential from the environment. Unset or blank values yield `None`.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self(v.trim().to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly named file, or try the default locations and
    /// fall back to built-in defaults when none exist
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_source(config_path).map(|(config, _)| config)
    }

    /// Like [`AppConfig::load_or_default`], also reporting where the config came from
    pub fn load_with_source(config_path: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        match config_path {
            Some(path) => Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf()))),
            None => {
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())));
                    }
                }
                Ok((Self::default(), ConfigSource::Defaults))
            }
        }
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.route.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.route must start with '/': {}",
                self.server.route
            )));
        }
        for (field, value) in [
            ("upstream.url", &self.upstream.url),
            ("client.endpoint", &self.client.endpoint),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| ConfigError::Validation(format!("{} is not a valid URL: {}", field, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "{} must use http or https: {}",
                    field, value
                )));
            }
        }
        if self.upstream.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "upstream.max_tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.upstream.temperature) {
            return Err(ConfigError::Validation(format!(
                "upstream.temperature must be between 0.0 and 2.0: {}",
                self.upstream.temperature
            )));
        }
        for (field, value) in [
            ("persona.system_prompt", &self.persona.system_prompt),
            ("persona.greeting", &self.persona.greeting),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{} must not be blank", field)));
            }
        }
        if self.upstream.api_key_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "upstream.api_key_env must name an environment variable".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the effective configuration was loaded from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults (no config file found)"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
