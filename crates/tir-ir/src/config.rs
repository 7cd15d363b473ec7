//! Compiler configuration threaded through type checking

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while loading a [`CompileConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings of the compiler that consumes the graph.
///
/// Missing fields in a config file fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Default integer precision of the host program
    pub default_ip: DataType,
    /// Default floating point precision of the host program
    pub default_fp: DataType,
    /// Log every resolved node type
    pub debug: bool,
    /// Bounds checks requested for the generated code
    pub check_out_of_bound: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            default_ip: DataType::I32,
            default_fp: DataType::F32,
            debug: false,
            check_out_of_bound: false,
        }
    }
}

impl CompileConfig {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }
}
