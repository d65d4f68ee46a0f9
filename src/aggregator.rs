//! Quote aggregation service
//!
//! Ties the providers, the merge engine and the aggregate cache together for
//! one incoming request.

use crate::{
    config::AggregatorConfig,
    constants::{CACHE_TTL_SECS, DEFAULT_CURRENCY_CODES},
    error::{ProviderError, QuoteError},
    merge::{self, MergeInputs},
    metrics::UpstreamMetrics,
    provider::{MarketDataProvider, SpotPriceProvider, SupplyProvider},
    providers::{
        CoinGeckoDirectory, CoinGeckoMarketProvider, CoinMarketCapProvider, CoinbaseProvider,
    },
    resolver::SymbolResolver,
    store::{AggregateCache, MemoryAggregateCache},
    types::{
        normalize_currency_code, normalize_symbol, CachedAggregate, ComponentHealth, HealthStatus,
        Quote,
    },
};
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Success rate under which a provider counts as failing in health checks
const HEALTHY_SUCCESS_RATE: f64 = 0.5;

/// Normalizes requested currency codes
///
/// Codes are trimmed and upper-cased, blanks dropped and duplicates removed
/// keeping the first occurrence. An absent or empty request yields `defaults`.
pub fn resolve_currency_codes(requested: Option<Vec<String>>, defaults: &[String]) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for code in requested.unwrap_or_default() {
        let code = normalize_currency_code(&code);
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }

    if codes.is_empty() {
        defaults.to_vec()
    } else {
        codes
    }
}

fn log_metadata_failure(provider: &'static str, err: &ProviderError) {
    if err.is_not_found() {
        tracing::debug!(provider, error = %err, "Symbol not listed by metadata provider");
    } else {
        tracing::warn!(provider, error = %err, "Metadata provider unavailable");
    }
}

/// Per-request quote orchestrator
///
/// The spot provider is the price-of-record and is called on every request.
/// Supply and market metadata are fetched only on a cache miss, and their
/// merged result is cached per symbol.
///
/// # Example
/// ```no_run
/// use quote_aggregator::{AggregatorConfig, QuoteAggregator};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AggregatorConfig::from_env()?;
/// let client = quote_aggregator::providers::build_http_client(&config)?;
/// let (aggregator, resolver) = QuoteAggregator::from_config(&config, client);
/// resolver.refresh().await?;
///
/// let quotes = aggregator.quote("btc", Some(vec!["usd".to_string()])).await?;
/// println!("BTC: {} USD", quotes[0].price);
/// # Ok(())
/// # }
/// ```
pub struct QuoteAggregator {
    spot: Arc<dyn SpotPriceProvider>,
    supply: Arc<dyn SupplyProvider>,
    market: Arc<dyn MarketDataProvider>,
    cache: Arc<dyn AggregateCache>,
    metrics: Arc<UpstreamMetrics>,
    cache_ttl: Duration,
    default_currency_codes: Vec<String>,
}

impl QuoteAggregator {
    /// Creates an aggregator over custom providers with an in-memory cache
    ///
    /// Mainly for tests with mock providers.
    pub fn with_providers(
        spot: Arc<dyn SpotPriceProvider>,
        supply: Arc<dyn SupplyProvider>,
        market: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            spot,
            supply,
            market,
            cache: Arc::new(MemoryAggregateCache::new()),
            metrics: Arc::new(UpstreamMetrics::new()),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            default_currency_codes: DEFAULT_CURRENCY_CODES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    /// Wires the Coinbase, CoinMarketCap and CoinGecko clients from `config`
    ///
    /// All providers share `client`. The returned resolver is the one the
    /// market provider resolves through; the caller owns its refresh cycle.
    pub fn from_config(config: &AggregatorConfig, client: Client) -> (Self, Arc<SymbolResolver>) {
        let directory = CoinGeckoDirectory::new(client.clone(), &config.coingecko_api_url);
        let resolver = Arc::new(SymbolResolver::in_memory(Arc::new(directory)));

        let spot = CoinbaseProvider::new(client.clone(), &config.coinbase_api_url);
        let supply = CoinMarketCapProvider::new(
            client.clone(),
            &config.coinmarketcap_api_url,
            config.coinmarketcap_api_key.clone(),
        );
        let market =
            CoinGeckoMarketProvider::new(client, &config.coingecko_api_url, resolver.clone());

        let aggregator = Self::with_providers(Arc::new(spot), Arc::new(supply), Arc::new(market))
            .with_cache_ttl(config.cache_ttl)
            .with_default_currency_codes(config.default_currency_codes.clone());

        (aggregator, resolver)
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_default_currency_codes(mut self, codes: Vec<String>) -> Self {
        self.default_currency_codes = codes;
        self
    }

    /// Quotes `symbol` in every requested currency
    ///
    /// Returns one [`Quote`] per normalized currency code, in request order.
    /// Fails as a whole when the spot provider does not know the symbol or one
    /// of the currencies, or when no metadata source answered on a cache miss.
    pub async fn quote(
        &self,
        symbol: &str,
        currency_codes: Option<Vec<String>>,
    ) -> Result<Vec<Quote>, QuoteError> {
        let symbol = normalize_symbol(symbol);
        let codes = resolve_currency_codes(currency_codes, &self.default_currency_codes);
        let span = tracing::info_span!("quote", request_id = %Uuid::new_v4(), symbol = %symbol);

        async move {
            if symbol.is_empty() {
                return Err(QuoteError::symbol_not_found(&symbol));
            }

            let start = Instant::now();
            let result = match self.cache.get(&symbol).await {
                Some(cached) => self.quote_cached(&symbol, &codes, &cached).await,
                None => self.quote_fresh(&symbol, &codes).await,
            };

            match &result {
                Ok(quotes) => tracing::info!(
                    count = quotes.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Quote served"
                ),
                Err(e) => tracing::warn!(
                    status = e.status_code(),
                    error = %e,
                    "Quote failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Cache hit: live price spliced onto cached metadata
    async fn quote_cached(
        &self,
        symbol: &str,
        codes: &[String],
        cached: &CachedAggregate,
    ) -> Result<Vec<Quote>, QuoteError> {
        tracing::debug!("Aggregate cache hit");
        let rates = self
            .record(self.spot.provider_name(), self.spot.fetch_rates(symbol, codes))
            .await
            .map_err(|e| QuoteError::from_primary(symbol, e))?;

        merge::splice_cached(symbol, codes, &rates, cached)
    }

    /// Cache miss: spot first, then both metadata sources concurrently
    async fn quote_fresh(&self, symbol: &str, codes: &[String]) -> Result<Vec<Quote>, QuoteError> {
        tracing::debug!("Aggregate cache miss");
        let rates = self
            .record(self.spot.provider_name(), self.spot.fetch_rates(symbol, codes))
            .await
            .map_err(|e| QuoteError::from_primary(symbol, e))?;

        let (supply, markets) = tokio::join!(
            self.record(self.supply.provider_name(), self.supply.fetch_supply(symbol)),
            self.record(self.market.provider_name(), self.market.fetch_markets(symbol, codes)),
        );

        let supply = supply
            .inspect_err(|e| log_metadata_failure(self.supply.provider_name(), e))
            .ok();
        let markets = markets
            .inspect_err(|e| log_metadata_failure(self.market.provider_name(), e))
            .ok();

        let quotes = merge::merge(
            symbol,
            codes,
            MergeInputs {
                rates: Some(&rates),
                supply: supply.as_ref(),
                markets: markets.as_ref(),
            },
        )?;

        if let Some(first) = quotes.first() {
            self.cache
                .put(symbol, CachedAggregate::from(first), self.cache_ttl)
                .await;
        }
        Ok(quotes)
    }

    /// Awaits one upstream call and records its outcome
    ///
    /// A not-found answer is a healthy upstream reply to a bad request, so
    /// only transport, rate-limit, decoding and API errors count as failures.
    async fn record<T>(
        &self,
        provider_name: &'static str,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let start = Instant::now();
        let result = call.await;
        let latency = start.elapsed();

        let answered = match &result {
            Ok(_) => true,
            Err(e) => e.is_not_found(),
        };
        self.metrics.record(provider_name, latency, answered).await;
        tracing::debug!(
            provider = provider_name,
            latency_ms = latency.as_millis() as u64,
            success = result.is_ok(),
            answered,
            "Upstream call finished"
        );
        result
    }

    /// Perform a health check on the aggregator
    ///
    /// # Returns
    /// ComponentHealth indicating the status of the aggregator and its upstreams
    pub async fn health_check(&self, resolver: &SymbolResolver) -> ComponentHealth {
        let mut details = HashMap::new();

        let mappings = resolver.mapping_count().await;
        details.insert("symbol_mappings".to_string(), serde_json::json!(mappings));
        details.insert(
            "cached_aggregates".to_string(),
            serde_json::json!(self.cache.live_entries().await),
        );

        let spot = self.metrics.provider(self.spot.provider_name()).await;
        let supply = self.metrics.provider(self.supply.provider_name()).await;
        let market = self.metrics.provider(self.market.provider_name()).await;
        details.insert(
            "providers".to_string(),
            serde_json::json!(self.metrics.snapshot().await),
        );

        let failing_metadata: Vec<&str> = [&supply, &market]
            .into_iter()
            .filter(|m| m.total_requests > 0 && m.success_rate < HEALTHY_SUCCESS_RATE)
            .map(|m| m.provider_name.as_str())
            .collect();

        let spot_failing = spot.total_requests > 0 && spot.success_rate < HEALTHY_SUCCESS_RATE;
        let status = if spot_failing {
            HealthStatus::Unhealthy
        } else if mappings == 0 || !failing_metadata.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Quote aggregator is operational".to_string(),
            HealthStatus::Degraded if mappings == 0 => {
                "Quote aggregator has no symbol mappings loaded".to_string()
            }
            HealthStatus::Degraded => format!(
                "Metadata providers failing: {}",
                failing_metadata.join(", ")
            ),
            HealthStatus::Unhealthy => format!(
                "Price provider {} success rate is {:.0}%",
                spot.provider_name,
                spot.success_rate * 100.0
            ),
        };

        ComponentHealth {
            name: "quote_aggregator".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }
}
