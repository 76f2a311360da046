use std::env;
use std::path::PathBuf;

/// Data-layer configuration.
///
/// Reads the snapshot file path from the `MKTPLAN_DATA_FILE` environment
/// variable; `None` means a fresh in-memory backend with no persistence.
#[derive(Debug, Clone, Default)]
pub struct DataConfig {
    /// Path to the JSON snapshot file, if any.
    pub data_file: Option<PathBuf>,
}

impl DataConfig {
    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let data_file = env::var("MKTPLAN_DATA_FILE").ok().map(PathBuf::from);
        Self { data_file }
    }

    /// Build a config from an explicit path (useful for tests and CLI flags).
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: Some(data_file.into()),
        }
    }
}
