// src/config.rs
use crate::connectors::backoff::{BackoffConfig, BackoffKind};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    // --- Gateway ---
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    // --- Credentials ---
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,

    // --- Dashboard ---
    #[serde(default = "default_tracked_symbol")]
    pub tracked_symbol: String,
    #[serde(default = "default_chart_capacity")]
    pub chart_capacity: usize,
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,
    #[serde(default = "default_flash_millis")]
    pub flash_millis: u64,

    // --- Reconnect ---
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter: f64,
    #[serde(default)]
    pub reconnect_max_attempts: u32,

    // --- Files ---
    #[serde(default = "default_session_file")]
    pub session_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_gateway_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_stream_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_tracked_symbol() -> String {
    "AAPL".to_string()
}

fn default_chart_capacity() -> usize {
    20
}

fn default_alert_capacity() -> usize {
    50
}

fn default_flash_millis() -> u64 {
    1000
}

fn default_reconnect_backoff() -> String {
    "fixed".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_reconnect_max_delay_secs() -> u64 {
    60
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}

fn default_reconnect_jitter() -> f64 {
    0.1
}

fn default_session_file() -> String {
    "session.json".to_string()
}

fn default_log_file() -> String {
    "quotewatch.log".to_string()
}

impl AppConfig {
    /// Layered load: optional Settings file, then QUOTEWATCH_* environment
    /// variables on top.
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::with_prefix("QUOTEWATCH").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn flash_decay(&self) -> Duration {
        Duration::from_millis(self.flash_millis)
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        let kind = if self.reconnect_backoff.eq_ignore_ascii_case("exponential") {
            BackoffKind::Exponential
        } else {
            BackoffKind::Fixed
        };
        BackoffConfig {
            kind,
            initial_delay: Duration::from_secs(self.reconnect_delay_secs),
            max_delay: Duration::from_secs(self.reconnect_max_delay_secs),
            multiplier: self.reconnect_multiplier,
            jitter_factor: self.reconnect_jitter,
            max_attempts: self.reconnect_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.gateway_url, "http://localhost:8080");
        assert_eq!(config.stream_url, "ws://localhost:8080/ws");
        assert_eq!(config.tracked_symbol, "AAPL");
        assert_eq!(config.chart_capacity, 20);
        assert_eq!(config.alert_capacity, 50);
        assert_eq!(config.flash_millis, 1000);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.reconnect_max_attempts, 0);
        assert!(!config.has_credentials());
    }

    #[test]
    fn backoff_kind_parses_case_insensitively() {
        let mut config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backoff_config().kind, BackoffKind::Fixed);

        config.reconnect_backoff = "Exponential".to_string();
        assert_eq!(config.backoff_config().kind, BackoffKind::Exponential);

        config.reconnect_backoff = "garbage".to_string();
        assert_eq!(config.backoff_config().kind, BackoffKind::Fixed);
    }

    #[test]
    fn flash_decay_uses_configured_millis() {
        let mut config: AppConfig = serde_json::from_str("{}").unwrap();
        config.flash_millis = 250;
        assert_eq!(config.flash_decay(), Duration::from_millis(250));
    }
}
