//! Types for the quote aggregator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalizes a ticker for cache keys and upstream lookups (`" btc "` -> `"BTC"`)
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Normalizes a currency code (`" usd"` -> `"USD"`)
pub fn normalize_currency_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// One merged quote for a (symbol, currency) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,

    #[serde(rename = "currencyCode")]
    pub currency_code: String,

    /// Price of one unit of the symbol in `currency_code`
    pub price: Decimal,

    #[serde(rename = "marketCap")]
    pub market_cap: Decimal,

    /// 24h traded value in `currency_code`, when a source reports it
    #[serde(rename = "accTradePrice24h")]
    pub accumulated_trade_value_24h: Option<Decimal>,

    #[serde(rename = "circulatingSupply")]
    pub circulating_supply: Decimal,

    #[serde(rename = "maxSupply")]
    pub max_supply: Option<Decimal>,

    #[serde(rename = "provider")]
    pub provider_name: String,

    #[serde(rename = "lastUpdatedTimestamp")]
    pub last_updated: String,
}

/// Non-price fields of the most recent successful merge for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAggregate {
    pub market_cap: Decimal,
    pub circulating_supply: Decimal,
    pub max_supply: Option<Decimal>,
    #[serde(rename = "provider")]
    pub provider_name: String,
    #[serde(rename = "lastUpdatedTimestamp")]
    pub last_updated: String,
}

impl From<&Quote> for CachedAggregate {
    fn from(quote: &Quote) -> Self {
        Self {
            market_cap: quote.market_cap,
            circulating_supply: quote.circulating_supply,
            max_supply: quote.max_supply,
            provider_name: quote.provider_name.clone(),
            last_updated: quote.last_updated.clone(),
        }
    }
}

/// Entry of the upstream symbol directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMapping {
    /// Provider-specific id (e.g. `bitcoin`)
    pub internal_id: String,
    /// Ticker as listed by the directory (e.g. `btc`)
    pub ticker_symbol: String,
    pub display_name: String,
}

/// Spot rates of one symbol against the requested currencies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotRates {
    pub rates: HashMap<String, Decimal>,
}

impl SpotRates {
    pub fn rate(&self, currency_code: &str) -> Option<Decimal> {
        self.rates.get(currency_code).copied()
    }
}

/// Currency-independent supply metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyInfo {
    pub provider_name: String,
    pub circulating_supply: Decimal,
    pub max_supply: Option<Decimal>,
    pub last_updated: String,
}

/// Market data of one symbol in one currency
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub market_cap: Decimal,
    pub circulating_supply: Decimal,
    pub max_supply: Option<Decimal>,
    pub total_volume: Option<Decimal>,
    pub last_updated: String,
}

/// Market snapshots keyed by normalized currency code
pub type MarketSnapshots = HashMap<String, MarketSnapshot>;

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Every upstream is answering
    Healthy,
    /// Quotes are served with reduced fidelity
    Degraded,
    /// The price-of-record is failing
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub details: HashMap<String, serde_json::Value>,
    pub last_checked: DateTime<Utc>,
}
