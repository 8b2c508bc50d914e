use std::path::PathBuf;

use log::{info, warn};
use shellstate_proto::config::{Config, ConfigValidationError, DEFAULT_CONFIG_FILE_PATH};

/// Errors produced while loading the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading the configuration file from disk failed.
    Read { path: PathBuf, context: String },
    /// Parsing TOML content failed.
    Parse { path: PathBuf, context: String },
    /// Validation detected a logical inconsistency.
    Validation(ConfigValidationError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, context } => {
                write!(f, "failed to read config at {:?}: {}", path, context)
            }
            Self::Parse { path, context } => {
                write!(f, "failed to parse config at {:?}: {}", path, context)
            }
            Self::Validation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigValidationError> for ConfigError {
    fn from(err: ConfigValidationError) -> Self {
        Self::Validation(err)
    }
}

/// Loads and validates the configuration.
///
/// A missing file yields the defaults; an unreadable or invalid file is an
/// error so a typo never silently reverts the daemon to defaults.
pub fn get_config(override_path: Option<PathBuf>) -> Result<(Config, PathBuf), ConfigError> {
    let path = override_path
        .unwrap_or_else(|| PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_FILE_PATH).as_ref()));

    if !path.exists() {
        info!("no config file at {path:?}; using defaults");
        let config = Config::default();
        config.validate()?;
        return Ok((config, path));
    }

    let content = std::fs::read_to_string(&path).map_err(|err| ConfigError::Read {
        path: path.clone(),
        context: err.to_string(),
    })?;

    let config: Config = toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.clone(),
        context: err.to_string(),
    })?;

    config.validate()?;

    Ok((config, path))
}

/// Resolves the directory snapshot caches live in.
///
/// Order: explicit `cache_dir` (tilde-expanded), then the platform cache
/// directory, then `/tmp` as a last resort.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(dir) = config.cache_dir.as_deref() {
        let dir = dir.trim();
        if !dir.is_empty() {
            return PathBuf::from(shellexpand::tilde(dir).as_ref());
        }
    }

    match dirs::cache_dir() {
        Some(base) => base.join("shellstate"),
        None => {
            warn!("no platform cache directory; falling back to /tmp/shellstate");
            PathBuf::from("/tmp/shellstate")
        }
    }
}
