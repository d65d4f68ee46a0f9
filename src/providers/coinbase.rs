//! Coinbase spot rate provider (price-of-record)

use crate::{
    constants::COINBASE_EXCHANGE_RATES_ENDPOINT,
    error::ProviderError,
    provider::SpotPriceProvider,
    providers::get_json,
    types::{normalize_currency_code, SpotRates},
};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Coinbase `/exchange-rates` response
///
/// An unknown currency comes back as `{"errors": [...]}` without `data`.
#[derive(Debug, Deserialize)]
struct ExchangeRatesResponse {
    data: Option<ExchangeRatesData>,
    errors: Option<Vec<CoinbaseApiError>>,
}

#[derive(Debug, Deserialize)]
struct ExchangeRatesData {
    rates: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseApiError {
    #[serde(default)]
    message: String,
}

/// Coinbase exchange-rate provider
pub struct CoinbaseProvider {
    client: Client,
    base_url: String,
}

impl CoinbaseProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Extracts the requested rates, failing on the first missing code
    fn parse_response(
        symbol: &str,
        response: ExchangeRatesResponse,
        currency_codes: &[String],
    ) -> Result<SpotRates, ProviderError> {
        if let Some(errors) = response.errors {
            let message = errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or_default();
            tracing::debug!(symbol, detail = message, "Coinbase reported unknown currency");
            return Err(ProviderError::UnsupportedAsset(symbol.to_string()));
        }

        let data = response
            .data
            .ok_or_else(|| ProviderError::invalid_response("Coinbase response has no data"))?;

        let mut rates = HashMap::with_capacity(currency_codes.len());
        for code in currency_codes {
            let code = normalize_currency_code(code);
            let raw = data
                .rates
                .get(&code)
                .ok_or_else(|| ProviderError::UnsupportedCurrency(code.clone()))?;
            let rate = parse_rate(raw).ok_or_else(|| {
                ProviderError::invalid_response(format!("Unparseable {} rate: {}", code, raw))
            })?;
            rates.insert(code, rate);
        }

        Ok(SpotRates { rates })
    }
}

fn parse_rate(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

#[async_trait]
impl SpotPriceProvider for CoinbaseProvider {
    async fn fetch_rates(
        &self,
        symbol: &str,
        currency_codes: &[String],
    ) -> Result<SpotRates, ProviderError> {
        let url = format!("{}{}", self.base_url, COINBASE_EXCHANGE_RATES_ENDPOINT);
        tracing::debug!(symbol, url = %url, "Fetching exchange rates from Coinbase");

        let request = self.client.get(&url).query(&[("currency", symbol)]);
        let parsed: ExchangeRatesResponse = get_json(request, self.provider_name()).await?;

        let rates = Self::parse_response(symbol, parsed, currency_codes)?;
        tracing::debug!(symbol, count = rates.rates.len(), "Fetched rates from Coinbase");
        Ok(rates)
    }

    fn provider_name(&self) -> &'static str {
        "coinbase"
    }
}
