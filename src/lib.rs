//! # Quote Aggregator
//!
//! Builds per-currency cryptocurrency quotes from three upstream sources:
//!
//! - a spot price provider (Coinbase), the price-of-record, called on every request
//! - a supply provider (CoinMarketCap) for circulating/max supply and the canonical slug
//! - a market data provider (CoinGecko), keyed by coin id through the [`SymbolResolver`]
//!
//! Metadata from a successful merge is cached per symbol for a short TTL; the
//! price is never cached.
//!
//! ## Usage
//!
//! ```no_run
//! use quote_aggregator::{AggregatorConfig, QuoteAggregator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AggregatorConfig::from_env()?;
//! let client = quote_aggregator::providers::build_http_client(&config)?;
//! let (aggregator, resolver) = QuoteAggregator::from_config(&config, client);
//! resolver.refresh().await?;
//!
//! for quote in aggregator.quote("eth", None).await? {
//!     println!("{} {}: {}", quote.symbol, quote.currency_code, quote.price);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use aggregator::QuoteAggregator;
pub use config::AggregatorConfig;
pub use error::{ConfigError, ProviderError, QuoteError};
pub use metrics::ProviderMetrics;
pub use resolver::SymbolResolver;
pub use types::{CachedAggregate, ComponentHealth, HealthStatus, Quote, SymbolMapping};
