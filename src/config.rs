use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::info;

use crate::browser::BrowserConfig;
use crate::extract::MAX_RENDER_TIMEOUT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub max_concurrent_renders: usize,
    pub max_queued_renders: usize,
    pub render_timeout: Duration,
    pub browser: BrowserConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_concurrent_renders: usize = try_load(&lookup, "MAX_CONCURRENT_RENDERS", "4")?;
        if max_concurrent_renders == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_RENDERS",
                message: "must be at least 1".to_string(),
            });
        }

        let timeout_secs: u64 = try_load(&lookup, "RENDER_TIMEOUT_SECS", "30")?;
        if timeout_secs == 0 || timeout_secs > MAX_RENDER_TIMEOUT.as_secs() {
            return Err(ConfigError::Invalid {
                key: "RENDER_TIMEOUT_SECS",
                message: format!("must be between 1 and {}", MAX_RENDER_TIMEOUT.as_secs()),
            });
        }

        let browser = BrowserConfig {
            headless: try_load(&lookup, "CHROME_HEADLESS", "true")?,
            chrome_path: lookup("CHROME_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            ..BrowserConfig::default()
        };

        Ok(Self {
            port: try_load(&lookup, "PORT", "3000")?,
            max_concurrent_renders,
            max_queued_renders: try_load(&lookup, "MAX_QUEUED_RENDERS", "16")?,
            render_timeout: Duration::from_secs(timeout_secs),
            browser,
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_concurrent_renders, 4);
        assert_eq!(config.max_queued_renders, 16);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert!(config.browser.headless);
        assert!(config.browser.chrome_path.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("MAX_CONCURRENT_RENDERS", "2"),
            ("MAX_QUEUED_RENDERS", "0"),
            ("RENDER_TIMEOUT_SECS", "10"),
            ("CHROME_HEADLESS", "false"),
            ("CHROME_PATH", "/usr/bin/chromium"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.max_concurrent_renders, 2);
        assert_eq!(config.max_queued_renders, 0);
        assert_eq!(config.render_timeout, Duration::from_secs(10));
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.chrome_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn rejects_malformed_port() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_zero_concurrency_and_timeout() {
        assert!(load(&[("MAX_CONCURRENT_RENDERS", "0")]).is_err());
        assert!(load(&[("RENDER_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn rejects_timeout_above_upper_bound() {
        let err = load(&[("RENDER_TIMEOUT_SECS", "18446744073709551615")]).unwrap_err();
        assert!(err.to_string().contains("RENDER_TIMEOUT_SECS"));
        assert!(load(&[("RENDER_TIMEOUT_SECS", "601")]).is_err());

        let config = load(&[("RENDER_TIMEOUT_SECS", "600")]).unwrap();
        assert_eq!(config.render_timeout, Duration::from_secs(600));
    }
}
