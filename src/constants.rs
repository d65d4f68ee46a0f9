//! Constants for the quote aggregator
//!
//! Compile-time defaults for every tunable. Each one can be overridden at
//! startup through [`AggregatorConfig::from_env`](crate::config::AggregatorConfig::from_env).

/// Currency codes quoted when a request does not name any
pub const DEFAULT_CURRENCY_CODES: &[&str] = &["KRW", "USD", "IDR", "SGD", "THB"];

/// How long merged metadata stays in the aggregate cache (in seconds)
pub const CACHE_TTL_SECS: u64 = 300;

/// How often the symbol directory is reloaded (in seconds)
pub const SYMBOL_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// HTTP request timeout for every upstream call (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// Provider name used when no source supplied one
pub const UNKNOWN_PROVIDER_NAME: &str = "unknown";

/// Coinbase API base URL
pub const COINBASE_API_URL: &str = "https://api.coinbase.com/v2";

/// Coinbase endpoint for spot exchange rates
pub const COINBASE_EXCHANGE_RATES_ENDPOINT: &str = "/exchange-rates";

/// CoinMarketCap API base URL
pub const COINMARKETCAP_API_URL: &str = "https://pro-api.coinmarketcap.com/v1";

/// CoinMarketCap endpoint for latest quotes
pub const COINMARKETCAP_QUOTES_ENDPOINT: &str = "/cryptocurrency/quotes/latest";

/// Header carrying the CoinMarketCap API key
pub const COINMARKETCAP_API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko endpoint for per-currency market data
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// CoinGecko endpoint listing every coin id with its ticker
pub const COINGECKO_COINS_LIST_ENDPOINT: &str = "/coins/list";

/// Default listen port of the HTTP service
pub const DEFAULT_PORT: u16 = 1928;

/// User agent for HTTP requests
pub const USER_AGENT: &str = concat!("quote-aggregator/", env!("CARGO_PKG_VERSION"));
