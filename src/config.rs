//! Runtime configuration
//!
//! Defaults come from [`crate::constants`]; every field can be overridden by
//! an environment variable (a `.env` file is honoured).

use crate::{
    constants::{
        CACHE_TTL_SECS, COINBASE_API_URL, COINGECKO_API_URL, COINMARKETCAP_API_URL,
        DEFAULT_CURRENCY_CODES, DEFAULT_PORT, REQUEST_TIMEOUT_SECS,
        SYMBOL_REFRESH_INTERVAL_SECS,
    },
    error::ConfigError,
    types::normalize_currency_code,
};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Settings for the aggregation service
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub bind_addr: SocketAddr,
    pub coinbase_api_url: String,
    pub coinmarketcap_api_url: String,
    pub coinmarketcap_api_key: Option<String>,
    pub coingecko_api_url: String,
    /// Timeout applied to every upstream call
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub symbol_refresh_interval: Duration,
    pub default_currency_codes: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            coinbase_api_url: COINBASE_API_URL.to_string(),
            coinmarketcap_api_url: COINMARKETCAP_API_URL.to_string(),
            coinmarketcap_api_key: None,
            coingecko_api_url: COINGECKO_API_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            symbol_refresh_interval: Duration::from_secs(SYMBOL_REFRESH_INTERVAL_SECS),
            default_currency_codes: DEFAULT_CURRENCY_CODES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl AggregatorConfig {
    /// Loads configuration from the environment.
    ///
    /// Optional:
    /// - `QUOTE_BIND_ADDR`: listen address (default: `0.0.0.0:1928`)
    /// - `COINBASE_API_URL`, `COINMARKETCAP_API_URL`, `COINGECKO_API_URL`: upstream base URLs
    /// - `COINMARKETCAP_API_KEY`: sent as `X-CMC_PRO_API_KEY`
    /// - `QUOTE_REQUEST_TIMEOUT_SECS`: per-call upstream timeout (default: 5)
    /// - `QUOTE_CACHE_TTL_SECS`: aggregate cache TTL (default: 300)
    /// - `SYMBOL_REFRESH_INTERVAL_SECS`: directory refresh period (default: 86400)
    /// - `QUOTE_DEFAULT_CURRENCIES`: comma-separated default currency codes
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("QUOTE_BIND_ADDR") {
            Some(raw) => parse_value("QUOTE_BIND_ADDR", &raw)?,
            None => defaults.bind_addr,
        };

        let secs = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            match get(key) {
                Some(raw) => {
                    let secs: u64 = parse_value(key, &raw)?;
                    if secs == 0 {
                        return Err(ConfigError::new(key, "must be greater than zero"));
                    }
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        let default_currency_codes = match get("QUOTE_DEFAULT_CURRENCIES") {
            Some(raw) => {
                let codes: Vec<String> = raw
                    .split(',')
                    .map(normalize_currency_code)
                    .filter(|c| !c.is_empty())
                    .collect();
                if codes.is_empty() {
                    return Err(ConfigError::new(
                        "QUOTE_DEFAULT_CURRENCIES",
                        "no currency codes listed",
                    ));
                }
                codes
            }
            None => defaults.default_currency_codes,
        };

        Ok(Self {
            bind_addr,
            coinbase_api_url: get("COINBASE_API_URL").unwrap_or(defaults.coinbase_api_url),
            coinmarketcap_api_url: get("COINMARKETCAP_API_URL")
                .unwrap_or(defaults.coinmarketcap_api_url),
            coinmarketcap_api_key: get("COINMARKETCAP_API_KEY"),
            coingecko_api_url: get("COINGECKO_API_URL").unwrap_or(defaults.coingecko_api_url),
            request_timeout: secs("QUOTE_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            cache_ttl: secs("QUOTE_CACHE_TTL_SECS", defaults.cache_ttl)?,
            symbol_refresh_interval: secs(
                "SYMBOL_REFRESH_INTERVAL_SECS",
                defaults.symbol_refresh_interval,
            )?,
            default_currency_codes,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::new(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AggregatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:1928".parse().unwrap());
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.symbol_refresh_interval, Duration::from_secs(86400));
        assert_eq!(
            config.default_currency_codes,
            vec!["KRW", "USD", "IDR", "SGD", "THB"]
        );
        assert!(config.coinmarketcap_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AggregatorConfig::from_lookup(lookup(&[
            ("QUOTE_BIND_ADDR", "127.0.0.1:8080"),
            ("QUOTE_CACHE_TTL_SECS", "60"),
            ("QUOTE_DEFAULT_CURRENCIES", " usd, eur ,"),
            ("COINMARKETCAP_API_KEY", "secret"),
            ("COINGECKO_API_URL", "http://localhost:9000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.default_currency_codes, vec!["USD", "EUR"]);
        assert_eq!(config.coinmarketcap_api_key.as_deref(), Some("secret"));
        assert_eq!(config.coingecko_api_url, "http://localhost:9000");
    }

    #[test]
    fn test_invalid_values() {
        let err = AggregatorConfig::from_lookup(lookup(&[("QUOTE_CACHE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(err.key, "QUOTE_CACHE_TTL_SECS");

        let err = AggregatorConfig::from_lookup(lookup(&[("QUOTE_REQUEST_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err.key, "QUOTE_REQUEST_TIMEOUT_SECS");

        assert!(AggregatorConfig::from_lookup(lookup(&[("QUOTE_BIND_ADDR", "nowhere")])).is_err());
    }
}
