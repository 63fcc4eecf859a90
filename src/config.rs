use std::env;
use std::str::FromStr;

use crate::error::{MarketError, MarketResult};
use crate::matching::dispatcher::MAX_FAN_OUT;
use crate::matching::recommender::RecommenderMode;

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub server_address: String,
    pub max_connections: u32,
    pub dispatch_fan_out: usize,
    pub recommender_mode: RecommenderMode,
}

impl AppConfig {
    /// Reads the process environment; call `dotenv()` first to pick up `.env`.
    pub fn from_env() -> MarketResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> MarketResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MarketError::config_error("DATABASE_URL must be set"))?;
        let server_address =
            lookup("SERVER_ADDRESS").unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let dispatch_fan_out: usize = parse_or(&lookup, "DISPATCH_FAN_OUT", MAX_FAN_OUT)?;
        let recommender_mode = parse_or(&lookup, "RECOMMENDER_MODE", RecommenderMode::default())?;

        if max_connections == 0 {
            return Err(MarketError::config_error(
                "DATABASE_MAX_CONNECTIONS must be at least 1",
            ));
        }

        Ok(Self {
            database_url,
            server_address,
            max_connections,
            dispatch_fan_out: dispatch_fan_out.clamp(1, MAX_FAN_OUT),
            recommender_mode,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> MarketResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| MarketError::config_error(format!("{key} has an invalid value: {raw}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "mysql://localhost/market")]))
                .unwrap();
        assert_eq!(config.server_address, DEFAULT_SERVER_ADDRESS);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.dispatch_fan_out, 5);
        assert_eq!(config.recommender_mode, RecommenderMode::Shape);
    }

    #[test]
    fn missing_database_url_fails() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }

    #[test]
    fn fan_out_is_clamped() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://localhost/market"),
            ("DISPATCH_FAN_OUT", "12"),
            ("RECOMMENDER_MODE", "item"),
        ]))
        .unwrap();
        assert_eq!(config.dispatch_fan_out, 5);
        assert_eq!(config.recommender_mode, RecommenderMode::Item);
    }

    #[test]
    fn malformed_values_fail() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://localhost/market"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }
}
