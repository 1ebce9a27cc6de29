use anyhow::{Context, Result};
use std::{str::FromStr, time::Duration};

/// Optional error-reporting endpoint. Only recorded in the startup summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub dsn: String,
    pub environment: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Idle reaper
    pub idle_timeout: Duration,
    pub reaper_interval: Duration,

    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            discord_token: non_empty("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            command_prefix: non_empty("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string()),

            idle_timeout: Duration::from_secs(parse_or(non_empty("IDLE_TIMEOUT_SECS"), "IDLE_TIMEOUT_SECS", 600)?),
            reaper_interval: Duration::from_secs(parse_or(
                non_empty("REAPER_INTERVAL_SECS"),
                "REAPER_INTERVAL_SECS",
                60,
            )?),

            telemetry: non_empty("TELEMETRY_DSN").map(|dsn| TelemetryConfig {
                dsn,
                environment: non_empty("TELEMETRY_ENVIRONMENT"),
            }),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token cannot be empty");
        }

        if self.command_prefix.is_empty() || self.command_prefix.contains(char::is_whitespace) {
            anyhow::bail!("Command prefix must be non-empty and contain no spaces, got: {:?}", self.command_prefix);
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.reaper_interval.is_zero() {
            anyhow::bail!("Reaper interval must be greater than 0");
        }

        Ok(())
    }

    /// Loggable description of the configuration. Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix {:?}\n  \
            Idle reaper: {} timeout, every {}\n  \
            Telemetry: {}",
            self.command_prefix,
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.reaper_interval),
            self.telemetry.as_ref().map_or("disabled".to_string(), |t| format!(
                "enabled ({})",
                t.environment.as_deref().unwrap_or("default environment")
            )),
        )
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got: {:?}", key, raw)),
        None => Ok(default),
    }
}
