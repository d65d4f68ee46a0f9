//! CoinGecko market data provider and symbol directory

use crate::{
    constants::{COINGECKO_COINS_LIST_ENDPOINT, COINGECKO_MARKETS_ENDPOINT},
    error::ProviderError,
    provider::{MarketDataProvider, SymbolDirectory},
    providers::get_json,
    resolver::SymbolResolver,
    types::{normalize_currency_code, MarketSnapshot, MarketSnapshots, SymbolMapping},
};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

/// One row of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    current_price: Option<Decimal>,
    market_cap: Option<Decimal>,
    circulating_supply: Option<Decimal>,
    max_supply: Option<Decimal>,
    total_volume: Option<Decimal>,
    last_updated: Option<String>,
}

/// Body CoinGecko returns instead of an array on bad parameters
#[derive(Debug, Deserialize)]
struct CoinGeckoApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarketsResponse {
    Markets(Vec<CoinGeckoMarket>),
    Error(CoinGeckoApiError),
}

/// One row of the `/coins/list` response
#[derive(Debug, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
    name: String,
}

/// CoinGecko per-currency market provider
///
/// CoinGecko keys coins by id, so every fetch first resolves the ticker
/// through the shared [`SymbolResolver`].
pub struct CoinGeckoMarketProvider {
    client: Client,
    base_url: String,
    resolver: Arc<SymbolResolver>,
}

impl CoinGeckoMarketProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        resolver: Arc<SymbolResolver>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            resolver,
        }
    }

    async fn fetch_market(
        &self,
        coin_id: &str,
        currency_code: &str,
    ) -> Result<(String, MarketSnapshot), ProviderError> {
        let url = format!("{}{}", self.base_url, COINGECKO_MARKETS_ENDPOINT);
        // CoinGecko expects lower-case vs_currency values
        let vs_currency = currency_code.to_lowercase();

        let request = self
            .client
            .get(&url)
            .query(&[("vs_currency", vs_currency.as_str()), ("ids", coin_id)])
            .header(reqwest::header::ACCEPT, "application/json");

        let response: MarketsResponse = get_json(request, self.provider_name()).await?;
        let snapshot = parse_market(coin_id, currency_code, response)?;
        Ok((currency_code.to_string(), snapshot))
    }
}

/// Checks a `/coins/markets` answer and extracts the mandatory fields
fn parse_market(
    coin_id: &str,
    currency_code: &str,
    response: MarketsResponse,
) -> Result<MarketSnapshot, ProviderError> {
    let market = match response {
        MarketsResponse::Error(e) => {
            return Err(ProviderError::ApiError(format!(
                "Invalid currency {}: {}",
                currency_code, e.error
            )))
        }
        MarketsResponse::Markets(markets) => markets
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnsupportedAsset(coin_id.to_string()))?,
    };

    let missing = |field: &str| {
        ProviderError::invalid_response(format!(
            "CoinGecko market for {} in {} has no {}",
            coin_id, currency_code, field
        ))
    };

    Ok(MarketSnapshot {
        price: market.current_price.ok_or_else(|| missing("current_price"))?,
        market_cap: market.market_cap.ok_or_else(|| missing("market_cap"))?,
        circulating_supply: market
            .circulating_supply
            .ok_or_else(|| missing("circulating_supply"))?,
        max_supply: market.max_supply,
        total_volume: market.total_volume,
        last_updated: market.last_updated.ok_or_else(|| missing("last_updated"))?,
    })
}

#[async_trait]
impl MarketDataProvider for CoinGeckoMarketProvider {
    async fn fetch_markets(
        &self,
        symbol: &str,
        currency_codes: &[String],
    ) -> Result<MarketSnapshots, ProviderError> {
        let coin_id = self.resolver.resolve(symbol).await?;
        tracing::debug!(symbol, coin_id = %coin_id, "Fetching markets from CoinGecko");

        let codes: Vec<String> = currency_codes
            .iter()
            .map(|c| normalize_currency_code(c))
            .collect();

        // Any failing currency fails the whole provider for this request.
        let snapshots = try_join_all(codes.iter().map(|code| self.fetch_market(&coin_id, code)))
            .await?
            .into_iter()
            .collect::<MarketSnapshots>();

        tracing::debug!(symbol, count = snapshots.len(), "Fetched markets from CoinGecko");
        Ok(snapshots)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

/// CoinGecko `/coins/list` directory
pub struct CoinGeckoDirectory {
    client: Client,
    base_url: String,
}

impl CoinGeckoDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn into_mappings(entries: Vec<CoinListEntry>) -> Vec<SymbolMapping> {
    entries
        .into_iter()
        .map(|entry| SymbolMapping {
            internal_id: entry.id,
            ticker_symbol: entry.symbol,
            display_name: entry.name,
        })
        .collect()
}

#[async_trait]
impl SymbolDirectory for CoinGeckoDirectory {
    async fn fetch_directory(&self) -> Result<Vec<SymbolMapping>, ProviderError> {
        let url = format!("{}{}", self.base_url, COINGECKO_COINS_LIST_ENDPOINT);
        tracing::debug!(url = %url, "Fetching symbol directory from CoinGecko");

        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        let entries: Vec<CoinListEntry> = get_json(request, self.provider_name()).await?;

        Ok(into_mappings(entries))
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
