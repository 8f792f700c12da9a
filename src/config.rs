// Configuration loading and parsing (gazetteer.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::enrich::client::RouteMode;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub proxy: ProxyConfig,
    pub provider: ProviderConfig,
    pub credentials: CredentialsConfig,
}

impl Config {
    /// Routing mode for the proxy client, parsed from `proxy.routing`.
    /// `validate` guarantees the string is one of the two known modes.
    pub fn route_mode(&self) -> RouteMode {
        match self.proxy.routing.as_str() {
            "co-hosted" => RouteMode::CoHosted,
            _ => RouteMode::Loopback,
        }
    }
}

// ---------------------------------------------------------------------------
// gazetteer.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire gazetteer.toml file.
#[derive(Debug, Clone, Deserialize)]
struct GazetteerFile {
    catalog: CatalogConfig,
    proxy: ProxyConfig,
    provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// `"loopback"` for local development, `"co-hosted"` when the client is
    /// served from the proxy's own origin.
    pub routing: String,
    pub listen_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// `"anthropic"` or `"gemini"`. Which credential is required follows
    /// from this choice.
    pub kind: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
}

/// Fill credential gaps from the environment. The file wins when both are
/// present.
fn apply_env_fallback(
    credentials: &mut CredentialsConfig,
    anthropic_env: Option<String>,
    google_env: Option<String>,
) {
    if credentials.anthropic_api_key.is_none() {
        credentials.anthropic_api_key = anthropic_env.filter(|k| !k.is_empty());
    }
    if credentials.google_api_key.is_none() {
        credentials.google_api_key = google_env.filter(|k| !k.is_empty());
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/gazetteer.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy
/// defaults. Prefer `load_config()` which handles default initialization.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let main_path = config_dir.join("gazetteer.toml");
    let main_text = read_file(&main_path)?;
    let main_file: GazetteerFile =
        toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
            path: main_path.clone(),
            source: e,
        })?;

    // credentials.toml is optional; credentials may come from the
    // environment instead.
    let credentials_path = config_dir.join("credentials.toml");
    let mut credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    apply_env_fallback(
        &mut credentials,
        std::env::var("ANTHROPIC_API_KEY").ok(),
        std::env::var("GOOGLEAI_API_KEY").ok(),
    );

    let config = Config {
        catalog: main_file.catalog,
        proxy: main_file.proxy,
        provider: main_file.provider,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. `.example` templates stay
/// where they are.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ found in {}; run from the project root",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }

        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", path.display(), target.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Convenience wrapper: copies default config files if needed, then loads
/// relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.endpoint.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "catalog.endpoint".into(),
            message: "must not be empty".into(),
        });
    }

    match config.proxy.routing.as_str() {
        "loopback" | "co-hosted" => {}
        other => {
            return Err(ConfigError::ValidationError {
                field: "proxy.routing".into(),
                message: format!("must be `loopback` or `co-hosted`, got `{other}`"),
            });
        }
    }

    if config.proxy.listen_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "proxy.listen_port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.provider.model.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "provider.model".into(),
            message: "must not be empty".into(),
        });
    }

    if config.provider.system_prompt.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "provider.system_prompt".into(),
            message: "must not be empty".into(),
        });
    }

    if config.provider.max_tokens == 0 {
        return Err(ConfigError::ValidationError {
            field: "provider.max_tokens".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
