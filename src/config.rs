use crate::profile::ScanProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub auth: AuthConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout: u64, // seconds
    pub user_agent: String,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Overrides every profile's poll interval when set.
    pub interval_ms: Option<u64>,
    pub distraction_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token_file: PathBuf,
    /// Send the stored access token with scan requests.
    pub attach_token: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                request_timeout: 30,
                user_agent: "TrustGrid/0.1".to_string(),
                verify_ssl: true,
            },
            polling: PollingConfig {
                interval_ms: None,
                distraction_delay_ms: 5000,
            },
            auth: AuthConfig {
                token_file: PathBuf::from("./.trustgrid/session.json"),
                attach_token: true,
            },
            reporting: ReportingConfig {
                output_dir: PathBuf::from("./reports"),
            },
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout)
    }

    pub fn distraction_delay(&self) -> Duration {
        Duration::from_millis(self.polling.distraction_delay_ms)
    }

    /// Apply the configured poll interval override to a profile.
    pub fn tune_profile(&self, profile: ScanProfile) -> ScanProfile {
        match self.polling.interval_ms {
            Some(ms) if ms > 0 => profile.with_poll_interval(Duration::from_millis(ms)),
            _ => profile,
        }
    }
}
