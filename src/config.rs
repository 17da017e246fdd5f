use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::BroadcastSettings;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub portal_http_timeout: Duration,
    pub scraper_page_delay: Duration,
    pub scraper_user_agent: String,
    pub broadcast_batch_size: usize,
    pub broadcast_message_delay: Duration,
    pub whatsapp_gateway_url: Option<String>,
    pub whatsapp_gateway_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5)?,
            portal_http_timeout: Duration::from_secs(env_or("PORTAL_HTTP_TIMEOUT_SECS", 30)?),
            scraper_page_delay: Duration::from_millis(env_or("SCRAPER_PAGE_DELAY_MS", 1500)?),
            scraper_user_agent: env::var("SCRAPER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            broadcast_batch_size: env_or("BROADCAST_BATCH_SIZE", 50)?,
            broadcast_message_delay: Duration::from_millis(env_or("BROADCAST_MESSAGE_DELAY_MS", 2000)?),
            whatsapp_gateway_url: env::var("WHATSAPP_GATEWAY_URL").ok(),
            whatsapp_gateway_token: env::var("WHATSAPP_GATEWAY_TOKEN").ok(),
        })
    }

    pub fn broadcast_settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            batch_size: self.broadcast_batch_size,
            message_delay: self.broadcast_message_delay,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(name, env::var(name).ok(), default)
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        None => Ok(default),
    }
}
