use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub elexon_api_url: String,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub max_retry_attempts: u32,
    pub difficulty_file: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let elexon_api_url = env_map
            .get("ELEXON_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://data.elexon.co.uk/bmrs/api/v1".to_string());

        // The upstream enforces a requests-per-minute cap; keep the fan-out small.
        let fetch_concurrency = env_map
            .get("FETCH_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("4")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FETCH_CONCURRENCY".to_string(),
                    "must be a valid usize".to_string(),
                )
            })?
            .clamp(1, 8);

        let fetch_timeout_secs = env_map
            .get("FETCH_TIMEOUT_SECS")
            .map(|s| s.as_str())
            .unwrap_or("30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FETCH_TIMEOUT_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let max_retry_attempts = env_map
            .get("MAX_RETRY_ATTEMPTS")
            .map(|s| s.as_str())
            .unwrap_or("5")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "MAX_RETRY_ATTEMPTS".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        let difficulty_file = env_map.get("DIFFICULTY_FILE").cloned();

        Ok(Config {
            port,
            database_path,
            elexon_api_url,
            fetch_concurrency,
            fetch_timeout_secs,
            max_retry_attempts,
            difficulty_file,
        })
    }
}
