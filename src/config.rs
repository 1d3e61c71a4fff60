use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
/// Portfolio auto-refresh period.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const LOG_DIR: &str = "log";
pub const LOG_FILE_NAME: &str = "tradedesk.log";

pub const ENV_API_URL: &str = "TRADEDESK_API_URL";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "TRADEDESK_HTTP_TIMEOUT_SECS";
pub const ENV_REFRESH_SECS: &str = "TRADEDESK_REFRESH_SECS";
pub const ENV_DISPLAY_TZ: &str = "TRADEDESK_DISPLAY_TZ";

#[derive(Clone, Debug)]
pub struct DashboardConfig {
    pub base_url: String,
    pub http_timeout: Duration,
    pub refresh_interval: Duration,
    /// `None` renders timestamps in the machine's local zone.
    pub display_tz: Option<Tz>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            display_tz: None,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            cfg.base_url = normalize_base_url(&url)?;
        }

        if let Some(raw) = lookup(ENV_HTTP_TIMEOUT_SECS) {
            cfg.http_timeout = Duration::from_secs(parse_positive_secs(ENV_HTTP_TIMEOUT_SECS, &raw)?);
        }

        if let Some(raw) = lookup(ENV_REFRESH_SECS) {
            cfg.refresh_interval = Duration::from_secs(parse_positive_secs(ENV_REFRESH_SECS, &raw)?);
        }

        if let Some(raw) = lookup(ENV_DISPLAY_TZ) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<Tz>() {
                    Ok(tz) => cfg.display_tz = Some(tz),
                    Err(_) => warn!(
                        "Unknown {}={} ; falling back to local time",
                        ENV_DISPLAY_TZ, trimmed
                    ),
                }
            }
        }

        Ok(cfg)
    }

    pub fn with_overrides(mut self, base_url: Option<&str>, refresh_secs: Option<u64>) -> Result<Self> {
        if let Some(url) = base_url {
            self.base_url = normalize_base_url(url)?;
        }
        if let Some(secs) = refresh_secs {
            if secs == 0 {
                return Err(anyhow!("Refresh interval must be > 0 seconds"));
            }
            self.refresh_interval = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn endpoint(&self, path: &str) -> String {
        let normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}{}", self.base_url, normalized)
    }

    pub fn log_summary(&self) {
        info!(
            "API base url={} timeout={}s refresh={}s tz={}",
            self.base_url,
            self.http_timeout.as_secs(),
            self.refresh_interval.as_secs(),
            self.display_tz
                .map(|tz| tz.name().to_string())
                .unwrap_or_else(|| "local".to_string())
        );
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!("API url must start with http:// or https://, got '{}'", trimmed));
    }
    Ok(trimmed.to_string())
}

fn parse_positive_secs(key: &str, raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let secs = trimmed
        .parse::<u64>()
        .map_err(|_| anyhow!("Invalid {}: '{}'", key, trimmed))?;
    if secs == 0 {
        return Err(anyhow!("{} must be > 0", key));
    }
    Ok(secs)
}

pub fn log_file_path() -> PathBuf {
    PathBuf::from(LOG_DIR).join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = DashboardConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(30));
        assert!(cfg.display_tz.is_none());
    }

    #[test]
    fn env_values_are_parsed_and_trailing_slash_dropped() {
        let cfg = DashboardConfig::from_lookup(lookup_from(&[
            (ENV_API_URL, "http://trader.local:8000/"),
            (ENV_HTTP_TIMEOUT_SECS, "5"),
            (ENV_REFRESH_SECS, "10"),
            (ENV_DISPLAY_TZ, "America/New_York"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "http://trader.local:8000");
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.refresh_interval, Duration::from_secs(10));
        assert_eq!(cfg.display_tz, Some(chrono_tz::America::New_York));
        assert_eq!(cfg.endpoint("api/logs"), "http://trader.local:8000/api/logs");
    }

    #[test]
    fn zero_refresh_is_rejected() {
        assert!(DashboardConfig::from_lookup(lookup_from(&[(ENV_REFRESH_SECS, "0")])).is_err());
        assert!(DashboardConfig::default().with_overrides(None, Some(0)).is_err());
    }

    #[test]
    fn unknown_timezone_falls_back_to_local() {
        let cfg = DashboardConfig::from_lookup(lookup_from(&[(ENV_DISPLAY_TZ, "Mars/Olympus")])).unwrap();
        assert!(cfg.display_tz.is_none());
    }

    #[test]
    fn url_without_scheme_is_rejected() {
        assert!(DashboardConfig::default().with_overrides(Some("localhost:5000"), None).is_err());
    }
}
