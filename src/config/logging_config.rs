use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub log_to_file: bool,
    /// Appended to; defaults to `xfer_<YYYY-MM-DD>.log` in the working directory
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_to_file: true,
            log_file_path: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_file(&self) -> PathBuf {
        self.log_file_path.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "xfer_{}.log",
                chrono::Local::now().format("%Y-%m-%d")
            ))
        })
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
