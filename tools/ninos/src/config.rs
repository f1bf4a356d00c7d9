use crate::errors::NinosError;
use crate::logging::DEFAULT_MAX_PAYLOAD_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "NINOS_CONFIG";

const MIN_PAYLOAD_BYTES: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NinosConfig {
    pub spy: SpyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpyConfig {
    /// Permit spying on a slot that holds no method when a replacement is
    /// supplied. Restoration then removes the slot again.
    pub allow_absent_method: bool,
}

impl Default for SpyConfig {
    fn default() -> Self {
        Self {
            allow_absent_method: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub record_calls: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            record_calls: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialNinosConfig {
    spy: Option<PartialSpyConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialSpyConfig {
    allow_absent_method: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    record_calls: Option<bool>,
}

/// Parses TOML, filling anything the text leaves out from the defaults.
pub fn parse_config(text: &str) -> Result<NinosConfig, NinosError> {
    let partial: PartialNinosConfig =
        toml::from_str(text).map_err(|e| NinosError::ConfigParse(e.to_string()))?;
    let mut cfg = NinosConfig::default();
    merge_partial_config(&mut cfg, partial);
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Loads `path`, else the file named by `$NINOS_CONFIG`, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<NinosConfig, NinosError> {
    let resolved = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
    let Some(path) = resolved else {
        return Ok(NinosConfig::default());
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| NinosError::Io(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

fn merge_partial_config(cfg: &mut NinosConfig, partial: PartialNinosConfig) {
    if let Some(spy) = partial.spy {
        if let Some(allow) = spy.allow_absent_method {
            cfg.spy.allow_absent_method = allow;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = Some(path);
        }
        if let Some(max) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = max;
        }
        if let Some(record_calls) = logging.record_calls {
            cfg.logging.record_calls = record_calls;
        }
    }
}

fn validate_config(cfg: &NinosConfig) -> Result<(), NinosError> {
    if cfg.logging.max_payload_bytes < MIN_PAYLOAD_BYTES {
        return Err(NinosError::InvalidConfig(format!(
            "logging.max_payload_bytes must be at least {MIN_PAYLOAD_BYTES}"
        )));
    }
    if cfg.logging.record_calls && cfg.logging.path.is_none() {
        return Err(NinosError::InvalidConfig(
            "logging.record_calls requires logging.path".to_string(),
        ));
    }
    Ok(())
}
