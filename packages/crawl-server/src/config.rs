use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Processing sessions idle longer than this are reclaimed
    pub stall_threshold: Duration,
    pub claim_queue: i32,
    pub claim_batch_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            stall_threshold: Duration::from_secs(
                env::var("STALL_THRESHOLD_SECS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .context("STALL_THRESHOLD_SECS must be a valid number of seconds")?,
            ),
            claim_queue: env::var("CLAIM_QUEUE")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("CLAIM_QUEUE must be a valid number")?,
            claim_batch_size: env::var("CLAIM_BATCH_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("CLAIM_BATCH_SIZE must be a valid number")?,
        })
    }
}
