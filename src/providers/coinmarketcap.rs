//! CoinMarketCap supply metadata provider

use crate::{
    constants::{COINMARKETCAP_API_KEY_HEADER, COINMARKETCAP_QUOTES_ENDPOINT},
    error::ProviderError,
    provider::SupplyProvider,
    providers::get_json,
    types::SupplyInfo,
};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// Status codes CoinMarketCap uses for plan and rate limits
const RATE_LIMIT_ERROR_CODES: std::ops::RangeInclusive<i64> = 1008..=1011;

/// Status code for a request naming an unknown symbol
const BAD_REQUEST_ERROR_CODE: i64 = 400;

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    status: QuotesStatus,
    #[serde(default)]
    data: HashMap<String, CoinListing>,
}

#[derive(Debug, Deserialize)]
struct QuotesStatus {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinListing {
    slug: String,
    circulating_supply: Decimal,
    max_supply: Option<Decimal>,
    last_updated: String,
}

/// CoinMarketCap `quotes/latest` provider
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinMarketCapProvider {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn parse_response(symbol: &str, response: QuotesResponse) -> Result<SupplyInfo, ProviderError> {
        let code = response.status.error_code;
        if RATE_LIMIT_ERROR_CODES.contains(&code) {
            return Err(ProviderError::RateLimitExceeded);
        }
        if code == BAD_REQUEST_ERROR_CODE {
            return Err(ProviderError::UnsupportedAsset(symbol.to_string()));
        }
        if code != 0 {
            return Err(ProviderError::ApiError(format!(
                "CoinMarketCap error {}: {}",
                code,
                response.status.error_message.unwrap_or_default()
            )));
        }

        let mut data = response.data;
        let listing = data
            .remove(symbol)
            .ok_or_else(|| ProviderError::UnsupportedAsset(symbol.to_string()))?;

        Ok(SupplyInfo {
            provider_name: listing.slug,
            circulating_supply: listing.circulating_supply,
            max_supply: listing.max_supply,
            last_updated: listing.last_updated,
        })
    }
}

#[async_trait]
impl SupplyProvider for CoinMarketCapProvider {
    async fn fetch_supply(&self, symbol: &str) -> Result<SupplyInfo, ProviderError> {
        let url = format!("{}{}", self.base_url, COINMARKETCAP_QUOTES_ENDPOINT);
        tracing::debug!(symbol, url = %url, "Fetching supply from CoinMarketCap");

        let mut request = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("convert", "USD")])
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(COINMARKETCAP_API_KEY_HEADER, key);
        }

        let parsed: QuotesResponse = get_json(request, self.provider_name()).await?;
        Self::parse_response(symbol, parsed)
    }

    fn provider_name(&self) -> &'static str {
        "coinmarketcap"
    }
}
