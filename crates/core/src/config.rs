use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub generative: GenerativeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Connection settings for the generative text backend. The connect timeout
/// is short; the read timeout is long because replies stream token by token.
#[derive(Clone, Debug)]
pub struct GenerativeConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub generative_base_url: Option<String>,
    pub generative_model: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vendi.db?mode=rwc".to_owned(),
                max_connections: 5,
                timeout_secs: 30,
            },
            generative: GenerativeConfig {
                base_url: "http://localhost:11434".to_owned(),
                model: "llama3.1".to_owned(),
                api_key: None,
                connect_timeout_secs: 10,
                read_timeout_secs: 120,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_owned(), port: 8000 },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    /// Resolution order: built-in defaults, then the optional TOML file,
    /// then `VENDI_*` environment overrides, then programmatic overrides.
    /// The merged result is validated before use.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vendi.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(generative) = patch.generative {
            if let Some(base_url) = generative.base_url {
                self.generative.base_url = base_url;
            }
            if let Some(model) = generative.model {
                self.generative.model = model;
            }
            if let Some(api_key_value) = generative.api_key {
                self.generative.api_key = Some(api_key_value.into());
            }
            if let Some(connect_timeout_secs) = generative.connect_timeout_secs {
                self.generative.connect_timeout_secs = connect_timeout_secs;
            }
            if let Some(read_timeout_secs) = generative.read_timeout_secs {
                self.generative.read_timeout_secs = read_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = non_empty_env("VENDI_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(base_url) = non_empty_env("VENDI_GENERATIVE_BASE_URL") {
            self.generative.base_url = base_url;
        }
        if let Some(model) = non_empty_env("VENDI_GENERATIVE_MODEL") {
            self.generative.model = model;
        }
        if let Some(api_key_value) = non_empty_env("VENDI_GENERATIVE_API_KEY") {
            self.generative.api_key = Some(api_key_value.into());
        }
        if let Some(bind_address) = non_empty_env("VENDI_SERVER_BIND_ADDRESS") {
            self.server.bind_address = bind_address;
        }
        if let Some(raw_port) = non_empty_env("VENDI_SERVER_PORT") {
            self.server.port = raw_port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "VENDI_SERVER_PORT".to_owned(),
                value: raw_port,
            })?;
        }
        if let Some(level) = non_empty_env("VENDI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw_format) = non_empty_env("VENDI_LOG_FORMAT") {
            self.logging.format =
                raw_format.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "VENDI_LOG_FORMAT".to_owned(),
                    value: raw_format,
                })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(base_url) = overrides.generative_base_url {
            self.generative.base_url = base_url;
        }
        if let Some(model) = overrides.generative_model {
            self.generative.model = model;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_owned()));
        }
        if !self.generative.base_url.starts_with("http") {
            return Err(ConfigError::Validation(format!(
                "generative.base_url must be an http(s) url, got `{}`",
                self.generative.base_url
            )));
        }
        if self.generative.model.trim().is_empty() {
            return Err(ConfigError::Validation("generative.model must not be empty".to_owned()));
        }
        if self.generative.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "generative.connect_timeout_secs must be at least 1".to_owned(),
            ));
        }
        if self.generative.read_timeout_secs < self.generative.connect_timeout_secs {
            return Err(ConfigError::Validation(
                "generative.read_timeout_secs must not be shorter than the connect timeout"
                    .to_owned(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must not be 0".to_owned()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level must not be empty".to_owned()));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => {
            let default = Path::new("vendi.toml");
            default.exists().then(|| default.to_path_buf())
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw).map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    generative: Option<GenerativePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerativePatch {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
