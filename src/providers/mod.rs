pub mod coinbase;
pub mod coingecko;
pub mod coinmarketcap;

pub use coinbase::CoinbaseProvider;
pub use coingecko::{CoinGeckoDirectory, CoinGeckoMarketProvider};
pub use coinmarketcap::CoinMarketCapProvider;

use crate::{config::AggregatorConfig, constants::USER_AGENT, error::ProviderError};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// Builds the HTTP client shared by every provider
pub fn build_http_client(config: &AggregatorConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Sends a request and decodes the JSON body, classifying HTTP failures
pub(crate) async fn get_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(ProviderError::from_transport)?;
    let status = response.status();
    let response_text = response.text().await.map_err(ProviderError::from_transport)?;
    classify(status, &response_text, provider)
}

/// Turns a status and raw body into a decoded value or a provider error
///
/// Upstreams report bad symbols with a 4xx status and a JSON error body, so a
/// body that decodes wins over the status. 429 is always a rate limit.
pub(crate) fn classify<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    provider: &str,
) -> Result<T, ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimitExceeded);
    }

    match serde_json::from_str(body) {
        Ok(parsed) => Ok(parsed),
        Err(_) if !status.is_success() => {
            Err(ProviderError::ApiError(format!("HTTP {}: {}", status, body)))
        }
        Err(e) => Err(ProviderError::invalid_response(format!(
            "Failed to parse {} response: {}. Response: {}",
            provider, e, body
        ))),
    }
}
