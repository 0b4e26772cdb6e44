use serde::Deserialize;
use std::path::PathBuf;

/// Where the three bookkeeping files live
#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_plan_file")]
    pub plan_file: String,
    #[serde(default = "default_success_file")]
    pub success_file: String,
    #[serde(default = "default_error_file")]
    pub error_file: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            plan_file: default_plan_file(),
            success_file: default_success_file(),
            error_file: default_error_file(),
        }
    }
}

impl RegistryConfig {
    pub fn plan_path(&self) -> PathBuf {
        self.dir.join(&self.plan_file)
    }

    pub fn success_path(&self) -> PathBuf {
        self.dir.join(&self.success_file)
    }

    pub fn error_path(&self) -> PathBuf {
        self.dir.join(&self.error_file)
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_plan_file() -> String {
    "to_send.txt".to_string()
}

fn default_success_file() -> String {
    "send_success.txt".to_string()
}

fn default_error_file() -> String {
    "send_error.txt".to_string()
}
