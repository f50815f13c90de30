//! Environment configuration for the gateway process.

use anyhow::{bail, Context, Result};
use slack_gateway::{ErrorStatusPolicy, GatewayConfig};
use std::time::Duration;
use tracing::{info, warn};

/// Everything the process needs before it can serve
pub struct RuntimeConfig {
    pub gateway: GatewayConfig,
    /// Bot tokens to seed, as `(team_id, token)` pairs
    pub workspace_tokens: Vec<(String, String)>,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<RuntimeConfig> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration through `lookup`, overlaying defaults.
pub fn load_config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<RuntimeConfig> {
    let mut config = GatewayConfig::default();

    if let Some(name) = lookup("SLACK_APP_NAME") {
        config.app.name = name;
    }
    if let Some(prefix) = lookup("SLACK_ROUTE_PREFIX") {
        config.app.prefix = prefix;
    }
    if let Some(secret) = lookup("SLACK_SIGNING_SECRET") {
        config.app.signing_secret = secret;
        info!("Loaded signing secret from environment");
    }

    if let Some(host) = lookup("SLACK_GATEWAY_HOST") {
        config.http.host = host
            .parse()
            .with_context(|| format!("SLACK_GATEWAY_HOST is not an IP address: {host}"))?;
    }
    if let Some(port) = lookup("SLACK_GATEWAY_PORT") {
        config.http.port = port
            .parse()
            .with_context(|| format!("SLACK_GATEWAY_PORT is not a port: {port}"))?;
    }

    if let Some(secs) = lookup("SLACK_MAX_TIMESTAMP_AGE_SECS") {
        config.security.max_timestamp_age = Some(parse_secs("SLACK_MAX_TIMESTAMP_AGE_SECS", &secs)?);
    }
    if let Some(secs) = lookup("SLACK_HANDLER_TIMEOUT_SECS") {
        config.timeouts.handler = Some(parse_secs("SLACK_HANDLER_TIMEOUT_SECS", &secs)?);
    }
    if let Some(policy) = lookup("SLACK_ERROR_STATUS") {
        config.security.error_status = policy.parse::<ErrorStatusPolicy>()?;
    }

    let workspace_tokens = match lookup("SLACK_WORKSPACE_TOKENS") {
        Some(raw) => parse_workspace_tokens(&raw)?,
        None => Vec::new(),
    };

    config.validate()?;

    Ok(RuntimeConfig {
        gateway: config,
        workspace_tokens,
    })
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds: {value}"))?;
    if secs == 0 {
        bail!("{key} cannot be 0");
    }
    Ok(Duration::from_secs(secs))
}

/// Parse `T1=xoxb-...,T2=xoxb-...`.
fn parse_workspace_tokens(raw: &str) -> Result<Vec<(String, String)>> {
    let mut tokens = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((team, token)) = entry.split_once('=') else {
            bail!("SLACK_WORKSPACE_TOKENS entry is not TEAM=TOKEN: {entry}");
        };
        let (team, token) = (team.trim(), token.trim());
        if team.is_empty() || token.is_empty() {
            warn!(entry = team, "Skipping workspace token with empty team or token");
            continue;
        }
        tokens.push((team.to_string(), token.to_string()));
    }
    Ok(tokens)
}
