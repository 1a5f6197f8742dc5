use crate::engine::MatchTolerances;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub shipping_api_url: String,
    pub session_cookie: String,
    pub departure_window_secs: i64,
    pub fee_window_secs: i64,
    pub amount_window_secs: i64,
    pub amount_slack_pct: i64,
    pub trip_window_secs: i64,
    pub guard_rate: i64,
    pub vessel_delay_ms: u64,
    pub rotation_window_secs: u64,
    pub rotation_enabled: bool,
    pub rotation_user: Option<String>,
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

        let shipping_api_url = env_map
            .get("SHIPPING_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("SHIPPING_API_URL".to_string()))?;

        let session_cookie = env_map
            .get("SESSION_COOKIE")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("SESSION_COOKIE".to_string()))?;

        let departure_window_secs = parse_i64(&env_map, "DEPARTURE_WINDOW_SECS", "120")?;
        let fee_window_secs = parse_i64(&env_map, "FEE_WINDOW_SECS", "120")?;
        let amount_window_secs = parse_i64(&env_map, "AMOUNT_WINDOW_SECS", "600")?;
        let amount_slack_pct = parse_i64(&env_map, "AMOUNT_SLACK_PCT", "10")?;
        let trip_window_secs = parse_i64(&env_map, "TRIP_WINDOW_SECS", "600")?;
        let guard_rate = parse_i64(&env_map, "GUARD_RATE", "1500")?;

        let vessel_delay_ms = parse_i64(&env_map, "VESSEL_DELAY_MS", "50")? as u64;
        let rotation_window_secs = parse_i64(&env_map, "ROTATION_WINDOW_SECS", "3600")? as u64;

        let rotation_enabled = match env_map
            .get("ROTATION_ENABLED")
            .map(|s| s.as_str())
            .unwrap_or("false")
        {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ROTATION_ENABLED".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let rotation_user = env_map.get("ROTATION_USER").cloned();
        if rotation_enabled && rotation_user.is_none() {
            return Err(ConfigError::MissingEnv("ROTATION_USER".to_string()));
        }

        Ok(Config {
            port,
            database_path,
            shipping_api_url,
            session_cookie,
            departure_window_secs,
            fee_window_secs,
            amount_window_secs,
            amount_slack_pct,
            trip_window_secs,
            guard_rate,
            vessel_delay_ms,
            rotation_window_secs,
            rotation_enabled,
            rotation_user,
        })
    }

    /// Matching windows in the milliseconds the engine compares in.
    pub fn tolerances(&self) -> MatchTolerances {
        MatchTolerances {
            departure_window_ms: self.departure_window_secs * 1000,
            fee_window_ms: self.fee_window_secs * 1000,
            amount_window_ms: self.amount_window_secs * 1000,
            amount_slack_pct: self.amount_slack_pct,
            trip_window_ms: self.trip_window_secs * 1000,
            guard_rate: self.guard_rate,
        }
    }
}

fn parse_i64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<i64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<i64>()
        .map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string())
        })
}
