//! Service configuration from environment variables (and an optional `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use kitchencast_core::Frequency;
use kitchencast_forecast::{ModelChoice, MAX_HORIZON};
use kitchencast_observability::LogFormat;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Reported by `/health`.
    pub app_version: String,
    pub bind_addr: SocketAddr,
    /// Holds `sales.csv`, `tray_waste.csv` and `plate_waste.csv`.
    pub data_dir: PathBuf,
    /// Root of the versioned artifact store.
    pub artifacts_dir: PathBuf,
    pub frequency: Frequency,
    pub horizon: u32,
    pub enable_direct_upload: bool,
    pub model: ModelChoice,
    /// Forecast worker threads (0 = available parallelism).
    pub workers: usize,
    /// Snapshot directories kept on disk (at least 2).
    pub artifact_retention: usize,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("./data"),
            artifacts_dir: PathBuf::from("./artifacts"),
            frequency: Frequency::Weekly,
            horizon: 8,
            enable_direct_upload: true,
            model: ModelChoice::MovingAverage,
            workers: 0,
            artifact_retention: 2,
            log_format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ServiceConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());

        let horizon = parse_or(get("HORIZON"), "HORIZON", defaults.horizon)?;
        if horizon == 0 || horizon > MAX_HORIZON {
            return Err(invalid("HORIZON", horizon, format!("must be within 1..={MAX_HORIZON}")));
        }

        let artifact_retention =
            parse_or(get("ARTIFACT_RETENTION"), "ARTIFACT_RETENTION", defaults.artifact_retention)?;
        if artifact_retention < 2 {
            return Err(invalid("ARTIFACT_RETENTION", artifact_retention, "must be at least 2"));
        }

        Ok(Self {
            app_version: get("APP_VERSION").unwrap_or(defaults.app_version),
            bind_addr: parse_or(get("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            artifacts_dir: get("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            frequency: parse_or(get("FREQUENCY"), "FREQUENCY", defaults.frequency)?,
            horizon,
            enable_direct_upload: match get("ENABLE_DIRECT_UPLOAD") {
                Some(v) => parse_bool("ENABLE_DIRECT_UPLOAD", &v)?,
                None => defaults.enable_direct_upload,
            },
            model: parse_or(get("FORECAST_MODEL"), "FORECAST_MODEL", defaults.model)?,
            workers: parse_or(get("FORECAST_WORKERS"), "FORECAST_WORKERS", defaults.workers)?,
            artifact_retention,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", defaults.log_format)?,
        })
    }
}

fn invalid(var: &'static str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e: T::Err| invalid(var, &v, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, raw, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.horizon, 8);
        assert_eq!(cfg.frequency, Frequency::Weekly);
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.enable_direct_upload);
        assert_eq!(cfg.artifact_retention, 2);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = load(&[
            ("FREQUENCY", "M"),
            ("HORIZON", "12"),
            ("ENABLE_DIRECT_UPLOAD", "false"),
            ("FORECAST_MODEL", "linear_trend"),
            ("FORECAST_WORKERS", "3"),
            ("LOG_FORMAT", "text"),
            ("APP_VERSION", "2024.10"),
            ("DATA_DIR", "/srv/data"),
        ])
        .unwrap();
        assert_eq!(cfg.frequency, Frequency::Monthly);
        assert_eq!(cfg.horizon, 12);
        assert!(!cfg.enable_direct_upload);
        assert_eq!(cfg.model, ModelChoice::LinearTrend);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.app_version, "2024.10");
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/data"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("HORIZON", "0")]),
            Err(ConfigError::Invalid { var: "HORIZON", .. })
        ));
        assert!(load(&[("HORIZON", "abc")]).is_err());
        assert!(load(&[("FREQUENCY", "daily")]).is_err());
        assert!(load(&[("ARTIFACT_RETENTION", "1")]).is_err());
        assert!(load(&[("ENABLE_DIRECT_UPLOAD", "maybe")]).is_err());
        assert!(load(&[("BIND_ADDR", "localhost")]).is_err());
    }
}
