use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, builder::BoolishValueParser};
use thiserror::Error;
use zentickr_mcp::server::{DEFAULT_HTTP_ADDR, McpHttpServerConfig};
use zentickr_yahoo::{DEFAULT_BASE_URL, DEFAULT_COOKIE_URL, YahooConfig};

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Parser, Debug)]
#[command(name = "zentickr-mcpd", version, about = "Yahoo Finance MCP daemon.")]
struct CliArgs {
    #[arg(
        long,
        env = "ZENTICKR_PROVIDER_TIMEOUT_SECS",
        default_value_t = DEFAULT_PROVIDER_TIMEOUT_SECS
    )]
    provider_timeout_secs: u64,

    #[arg(
        long,
        env = "ZENTICKR_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(long, env = "ZENTICKR_YAHOO_BASE_URL", default_value = DEFAULT_BASE_URL)]
    yahoo_base_url: String,

    #[arg(long, env = "ZENTICKR_YAHOO_COOKIE_URL", default_value = DEFAULT_COOKIE_URL)]
    yahoo_cookie_url: String,

    #[arg(long, env = "ZENTICKR_USER_AGENT")]
    user_agent: Option<String>,

    #[arg(
        long = "stdio",
        env = "ZENTICKR_ENABLE_STDIO",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "ZENTICKR_MCP_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "ZENTICKR_MCP_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "ZENTICKR_PROVIDER_WARMUP",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    provider_warmup: bool,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct ZentickrConfig {
    pub provider_timeout: Duration,
    pub http_timeout: Duration,
    pub yahoo_base_url: String,
    pub yahoo_cookie_url: String,
    pub user_agent: Option<String>,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub provider_warmup: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} value: {value}")]
    InvalidSetting { name: &'static str, value: String },
    #[error("no transport enabled: set ZENTICKR_ENABLE_STDIO or ZENTICKR_MCP_SERVE")]
    NoTransport,
}

impl ZentickrConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::try_from(CliArgs::parse())
    }

    #[must_use]
    pub fn yahoo(&self) -> YahooConfig {
        let config = YahooConfig::new(self.yahoo_base_url.as_str())
            .with_cookie_url(self.yahoo_cookie_url.as_str())
            .with_request_timeout(self.http_timeout);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.as_str()),
            None => config,
        }
    }

    #[must_use]
    pub const fn http(&self) -> McpHttpServerConfig {
        McpHttpServerConfig::new(self.mcp_http_addr)
    }
}

fn non_zero_secs(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidSetting {
            name,
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn http_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidSetting { name, value })
    }
}

impl TryFrom<CliArgs> for ZentickrConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::NoTransport);
        }

        Ok(Self {
            provider_timeout: non_zero_secs(
                "ZENTICKR_PROVIDER_TIMEOUT_SECS",
                args.provider_timeout_secs,
            )?,
            http_timeout: non_zero_secs("ZENTICKR_HTTP_TIMEOUT_SECS", args.http_timeout_secs)?,
            yahoo_base_url: http_url("ZENTICKR_YAHOO_BASE_URL", args.yahoo_base_url)?,
            yahoo_cookie_url: http_url("ZENTICKR_YAHOO_COOKIE_URL", args.yahoo_cookie_url)?,
            user_agent: args.user_agent.filter(|value| !value.trim().is_empty()),
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            provider_warmup: args.provider_warmup,
        })
    }
}
