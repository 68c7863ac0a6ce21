use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub data_dir: PathBuf,
}

impl Config {
    /// Flag > environment > default.
    pub fn from_env(api_url_flag: Option<String>) -> Result<Self> {
        Self::resolve(api_url_flag, |key| std::env::var(key).ok())
    }

    pub fn resolve(
        api_url_flag: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_url = api_url_flag
            .or_else(|| env("JOBTRACK_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim_end_matches('/').to_string();

        let timeout = match env("JOBTRACK_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("JOBTRACK_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let data_dir = match env("JOBTRACK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        Ok(Self {
            api_url,
            timeout,
            data_dir,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("jobtrack.db")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("jobtrack.log")
    }
}

fn default_data_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".")
    }
}
