//! Gateway configuration.
//!
//! Process settings come from command-line flags with environment fallbacks
//! ([`Args`]) and are turned into a [`GatewayConfig`]. Rule files are loaded
//! and validated once, at startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alertgate_core::{RuleCatalog, RuleResolver, RuleSet};
use chrono::{FixedOffset, Offset, Utc};
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::error::{GatewayError, GatewayResult};

/// Default alert store address.
pub const DEFAULT_ALERTMANAGER_URL: &str = "http://0.0.0.0:9093";
/// Default notification route.
pub const DEFAULT_WEBHOOK_URL: &str = "http://0.0.0.0:8080";
/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Where the prior notification state of an alert is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StateSource {
    /// Query the alert store; fall back to the event's annotations when the
    /// store is unreachable or has no active record.
    #[default]
    Store,
    /// Trust the annotations carried by the inbound event.
    Annotations,
}

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "alertgate")]
#[command(about = "Alertmanager webhook gateway with notification throttling")]
#[command(version)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR")]
    pub bind: Option<SocketAddr>,

    /// Port to listen on when no bind address is given
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Alertmanager base URL used as the alert store
    #[arg(long, env = "ALERTMANAGER_URL", default_value = DEFAULT_ALERTMANAGER_URL)]
    pub alertmanager_url: String,

    /// Default notification route
    #[arg(long, env = "WEBHOOK_URL", default_value = DEFAULT_WEBHOOK_URL)]
    pub webhook_url: String,

    /// Path to the JSON rules file
    #[arg(long, env = "RULES_CONFIG")]
    pub rules: Option<PathBuf>,

    /// UTC offset used for day/night classification, e.g. +03:00
    #[arg(long, env = "UTC_OFFSET", default_value = "+00:00", value_parser = parse_utc_offset)]
    pub utc_offset: FixedOffset,

    /// Where prior alert state is read from
    #[arg(long, env = "STATE_SOURCE", value_enum, default_value_t = StateSource::Store)]
    pub state_source: StateSource,

    /// Timeout for outbound HTTP requests, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins, comma separated (empty allows any)
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    /// Converts parsed arguments into a gateway configuration.
    #[must_use]
    pub fn into_config(self) -> GatewayConfig {
        let bind_addr = self.bind.unwrap_or_else(|| {
            SocketAddr::from(([0, 0, 0, 0], self.port.unwrap_or(DEFAULT_PORT)))
        });

        GatewayConfig {
            bind_addr,
            alertmanager_url: self.alertmanager_url,
            webhook_url: self.webhook_url,
            rules_path: self.rules,
            utc_offset: self.utc_offset,
            state_source: self.state_source,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            cors_origins: self.cors_origins,
        }
    }
}

/// Parses `Z`, `UTC`, `+HH`, `+HH:MM` or `-HH:MM`.
///
/// # Errors
///
/// Returns a message suitable for clap when the value is not an offset.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let invalid = || format!("invalid UTC offset '{value}', expected +HH:MM");

    let (sign, rest) = match value.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: u8 = hours.parse().map_err(|_| invalid())?;
    let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    let seconds = i32::from(hours) * 3600 + i32::from(minutes) * 60;
    FixedOffset::east_opt(sign * seconds).ok_or_else(invalid)
}

/// Configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Alert store base URL.
    pub alertmanager_url: String,
    /// Default route for rules that name none.
    pub webhook_url: String,
    /// Rules file, if any.
    pub rules_path: Option<PathBuf>,
    /// Offset for day/night classification.
    pub utc_offset: FixedOffset,
    /// Prior state source.
    pub state_source: StateSource,
    /// Timeout for store and route requests.
    pub request_timeout: Duration,
    /// CORS allowed origins (empty means all).
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            alertmanager_url: DEFAULT_ALERTMANAGER_URL.to_string(),
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            rules_path: None,
            utc_offset: Utc.fix(),
            state_source: StateSource::Store,
            request_timeout: Duration::from_secs(10),
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }

    /// Set the alert store URL.
    #[must_use]
    pub fn with_alertmanager_url(mut self, url: impl Into<String>) -> Self {
        self.alertmanager_url = url.into();
        self
    }

    /// Set the default route.
    #[must_use]
    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = url.into();
        self
    }

    /// Set the rules file.
    #[must_use]
    pub fn with_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Set the day/night offset.
    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Set the prior state source.
    #[must_use]
    pub const fn with_state_source(mut self, source: StateSource) -> Self {
        self.state_source = source;
        self
    }

    /// Set the outbound request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a CORS allowed origin.
    #[must_use]
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Builds the rule resolver.
    ///
    /// Without a rules file every alert gets the built-in defaults routed to
    /// `webhook_url`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the file cannot be read or contains
    /// an invalid rule.
    pub fn load_rules(&self) -> GatewayResult<RuleResolver> {
        let routes = vec![self.webhook_url.clone()];
        match &self.rules_path {
            None => {
                info!("no rules file configured, using built-in defaults");
                Ok(RuleResolver::with_defaults(RuleSet::builtin(routes)))
            }
            Some(path) => load_rules_file(path, routes),
        }
    }
}

fn load_rules_file(path: &Path, routes: Vec<String>) -> GatewayResult<RuleResolver> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| GatewayError::Config(format!("failed to read {}: {e}", path.display())))?;

    let resolver = RuleCatalog::from_json(&contents)
        .and_then(|catalog| catalog.resolver(routes))
        .map_err(|e| GatewayError::Config(format!("{}: {e}", path.display())))?;

    info!(path = %path.display(), "loaded rules");
    Ok(resolver)
}
