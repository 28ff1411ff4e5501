use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::controller::{ControllerOptions, Timings};
use crate::threshold::Threshold;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";
const DEFAULT_STATUS_CLEAR_MS: u64 = 5_000;
const DEFAULT_SCROLL_DELAY_MS: u64 = 500;

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    endpoint: Option<String>,
    threshold: Option<ThresholdConfigFile>,
    request: Option<RequestConfigFile>,
    timings: Option<TimingsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    default: Option<f64>,
    control: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RequestConfigFile {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingsConfigFile {
    status_clear_ms: Option<u64>,
    scroll_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the prediction service.
    pub endpoint: String,
    pub default_threshold: Threshold,
    /// Whether the threshold can be changed after start-up.
    pub threshold_control: bool,
    /// `None` keeps the transport defaults.
    pub request_timeout: Option<Duration>,
    pub status_clear_after: Duration,
    pub scroll_delay: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_threshold: Threshold::DEFAULT,
            threshold_control: true,
            request_timeout: None,
            status_clear_after: Duration::from_millis(DEFAULT_STATUS_CLEAR_MS),
            scroll_delay: Duration::from_millis(DEFAULT_SCROLL_DELAY_MS),
        }
    }
}

impl ConsoleConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_CONSOLE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConsoleConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let default_threshold = match file.threshold.as_ref().and_then(|t| t.default) {
            Some(value) => Threshold::new(value)?,
            None => defaults.default_threshold,
        };
        let timings = file.timings.unwrap_or_default();
        Ok(Self {
            endpoint: file.endpoint.unwrap_or(defaults.endpoint),
            default_threshold,
            threshold_control: file
                .threshold
                .and_then(|t| t.control)
                .unwrap_or(defaults.threshold_control),
            request_timeout: file
                .request
                .and_then(|r| r.timeout_secs)
                .map(Duration::from_secs),
            status_clear_after: timings
                .status_clear_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.status_clear_after),
            scroll_delay: timings
                .scroll_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.scroll_delay),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("DETECT_CONSOLE_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint.trim().to_string();
            }
        }
        if let Ok(threshold) = std::env::var("DETECT_CONSOLE_THRESHOLD") {
            if !threshold.trim().is_empty() {
                self.default_threshold = Threshold::parse(&threshold)
                    .map_err(|e| anyhow!("DETECT_CONSOLE_THRESHOLD: {}", e))?;
            }
        }
        if let Ok(control) = std::env::var("DETECT_CONSOLE_THRESHOLD_CONTROL") {
            self.threshold_control = match control.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(anyhow!(
                        "DETECT_CONSOLE_THRESHOLD_CONTROL must be true or false, got '{}'",
                        other
                    ))
                }
            };
        }
        if let Ok(timeout) = std::env::var("DETECT_CONSOLE_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("DETECT_CONSOLE_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.request_timeout = Some(Duration::from_secs(seconds));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "endpoint must be http(s), got scheme '{}'",
                url.scheme()
            ));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            threshold_control: self.threshold_control,
            default_threshold: self.default_threshold,
            timings: Timings {
                status_clear_after: self.status_clear_after,
                scroll_delay: self.scroll_delay,
            },
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
