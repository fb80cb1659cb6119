use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where harness logs go
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Also write logs into this directory when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            filter: default_filter(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "logging.filter cannot be empty".into(),
            )));
        }

        if let Some(dir) = &self.log_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "logging.log_dir cannot be an empty path".into(),
                )));
            }
            if dir.exists() && !dir.is_dir() {
                return Err(Error::Config(ConfigError::Message(format!(
                    "logging.log_dir {} is not a directory",
                    dir.display()
                ))));
            }
        }

        Ok(())
    }
}

fn default_filter() -> String {
    "info".to_string()
}
