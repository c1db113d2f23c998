//! Environment configuration for the Dredd service
//!
//! All knobs come from the environment; defaults match the swarm's standard
//! deployment. Required keys are validated by the caller at startup so a
//! misconfigured service fails before touching the bus or database.

use crate::{Error, Result};

/// Service configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API port (`DREDD_PORT`, default 8750)
    pub port: u16,
    /// NATS server URL (`NATS_URL`)
    pub nats_url: String,
    /// Optional NATS auth token (`NATS_TOKEN`)
    pub nats_token: String,
    /// Postgres connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Log level (`LOG_LEVEL`, default "info")
    pub log_level: String,
    /// Anthropic API key (`ANTHROPIC_API_KEY`)
    pub anthropic_api_key: String,
    /// Extraction model (`DREDD_MODEL`)
    pub anthropic_model: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`); empty disables the review loop
    pub slack_bot_token: String,
    /// Slack review channel (`SLACK_DECISIONS_CHANNEL`)
    pub slack_channel: String,
    /// Chronicle base URL for transcript fetch fallback (`CHRONICLE_URL`)
    pub chronicle_url: String,
    /// Static bearer token for `/api/v1` routes (`DREDD_API_TOKEN`); empty disables auth
    pub api_token: String,
}

impl Config {
    /// Load configuration from the environment, applying defaults.
    pub fn load() -> Self {
        Self {
            port: env_u16("DREDD_PORT", 8750),
            nats_url: env_str("NATS_URL", "nats://hermes:4222"),
            nats_token: env_str("NATS_TOKEN", ""),
            database_url: env_str("DATABASE_URL", ""),
            log_level: env_str("LOG_LEVEL", "info"),
            anthropic_api_key: env_str("ANTHROPIC_API_KEY", ""),
            anthropic_model: env_str("DREDD_MODEL", "claude-sonnet-4-20250514"),
            slack_bot_token: env_str("SLACK_BOT_TOKEN", ""),
            slack_channel: env_str("SLACK_DECISIONS_CHANNEL", ""),
            chronicle_url: env_str("CHRONICLE_URL", "http://chronicle:8700"),
            api_token: env_str("DREDD_API_TOKEN", ""),
        }
    }

    /// Validate that the database is configured.
    pub fn require_database(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(Error::Config("DATABASE_URL is required".to_string()));
        }
        Ok(())
    }

    /// Validate that the LLM client is configured.
    pub fn require_anthropic(&self) -> Result<()> {
        if self.anthropic_api_key.is_empty() {
            return Err(Error::Config("ANTHROPIC_API_KEY is required".to_string()));
        }
        Ok(())
    }

    /// Whether the Slack review surface is configured.
    pub fn slack_configured(&self) -> bool {
        !self.slack_bot_token.is_empty() && !self.slack_channel.is_empty()
    }
}

fn env_str(key: &str, fallback: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn env_u16(key: &str, fallback: u16) -> u16 {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "invalid numeric env value, using default");
            fallback
        }),
        Err(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_when_unset() {
        std::env::remove_var("DREDD_PORT");
        std::env::remove_var("NATS_URL");
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("CHRONICLE_URL");

        let cfg = Config::load();
        assert_eq!(cfg.port, 8750);
        assert_eq!(cfg.nats_url, "nats://hermes:4222");
        assert_eq!(cfg.chronicle_url, "http://chronicle:8700");
        assert!(cfg.database_url.is_empty());
        assert!(cfg.require_database().is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        std::env::set_var("DREDD_PORT", "9000");
        std::env::set_var("DATABASE_URL", "postgres://localhost/dredd");

        let cfg = Config::load();
        assert_eq!(cfg.port, 9000);
        assert!(cfg.require_database().is_ok());

        std::env::remove_var("DREDD_PORT");
        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn invalid_port_falls_back() {
        std::env::set_var("DREDD_PORT", "not-a-port");
        let cfg = Config::load();
        assert_eq!(cfg.port, 8750);
        std::env::remove_var("DREDD_PORT");
    }
}
