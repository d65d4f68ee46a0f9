//! Provider abstractions for the three upstream sources and the symbol directory

use crate::{
    error::ProviderError,
    types::{MarketSnapshots, SpotRates, SupplyInfo, SymbolMapping},
};
use async_trait::async_trait;

/// Price-of-record: spot exchange rates for a symbol
///
/// Implementations must treat currency coverage as all-or-nothing: a missing
/// code fails the whole call with [`ProviderError::UnsupportedCurrency`], and
/// an unknown symbol fails with [`ProviderError::UnsupportedAsset`].
#[async_trait]
pub trait SpotPriceProvider: Send + Sync {
    /// Fetches rates for `symbol` against every code in `currency_codes`
    async fn fetch_rates(
        &self,
        symbol: &str,
        currency_codes: &[String],
    ) -> Result<SpotRates, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Currency-independent supply metadata looked up by ticker
#[async_trait]
pub trait SupplyProvider: Send + Sync {
    async fn fetch_supply(&self, symbol: &str) -> Result<SupplyInfo, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

/// Per-currency market data
///
/// A successful result holds one snapshot for every requested code; a
/// failure on any single currency fails the whole call.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_markets(
        &self,
        symbol: &str,
        currency_codes: &[String],
    ) -> Result<MarketSnapshots, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

/// Upstream listing of every ticker with its provider-specific id
#[async_trait]
pub trait SymbolDirectory: Send + Sync {
    async fn fetch_directory(&self) -> Result<Vec<SymbolMapping>, ProviderError>;

    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::{MarketSnapshot, SpotRates};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Manual "clone" of ProviderError since reqwest errors don't implement Clone
    fn replay(err: &ProviderError) -> ProviderError {
        match err {
            ProviderError::NetworkError(e) => {
                ProviderError::ApiError(format!("Network error (replayed): {}", e))
            }
            ProviderError::Timeout => ProviderError::Timeout,
            ProviderError::RateLimitExceeded => ProviderError::RateLimitExceeded,
            ProviderError::InvalidResponse(s) => ProviderError::InvalidResponse(s.clone()),
            ProviderError::UnsupportedAsset(s) => ProviderError::UnsupportedAsset(s.clone()),
            ProviderError::UnsupportedCurrency(s) => ProviderError::UnsupportedCurrency(s.clone()),
            ProviderError::Unresolved(s) => ProviderError::Unresolved(s.clone()),
            ProviderError::ApiError(s) => ProviderError::ApiError(s.clone()),
        }
    }

    #[derive(Default)]
    struct CallLog {
        calls: Mutex<usize>,
    }

    impl CallLog {
        fn hit(&self) {
            *self.calls.lock().unwrap() += 1;
        }

        fn count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    /// Spot provider answering from a fixed rate table
    #[derive(Default)]
    pub struct MockSpotProvider {
        rates: Mutex<HashMap<String, HashMap<String, Decimal>>>,
        error: Mutex<Option<ProviderError>>,
        log: CallLog,
    }

    impl MockSpotProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_rate(&self, symbol: &str, currency_code: &str, rate: Decimal) {
            self.rates
                .lock()
                .unwrap()
                .entry(symbol.to_string())
                .or_default()
                .insert(currency_code.to_string(), rate);
        }

        pub fn set_error(&self, error: ProviderError) {
            *self.error.lock().unwrap() = Some(error);
        }

        pub fn call_count(&self) -> usize {
            self.log.count()
        }
    }

    #[async_trait]
    impl SpotPriceProvider for MockSpotProvider {
        async fn fetch_rates(
            &self,
            symbol: &str,
            currency_codes: &[String],
        ) -> Result<SpotRates, ProviderError> {
            self.log.hit();
            if let Some(err) = self.error.lock().unwrap().as_ref() {
                return Err(replay(err));
            }

            let table = self.rates.lock().unwrap();
            let known = table
                .get(symbol)
                .ok_or_else(|| ProviderError::UnsupportedAsset(symbol.to_string()))?;

            let mut rates = HashMap::new();
            for code in currency_codes {
                let rate = known
                    .get(code)
                    .ok_or_else(|| ProviderError::UnsupportedCurrency(code.clone()))?;
                rates.insert(code.clone(), *rate);
            }
            Ok(SpotRates { rates })
        }

        fn provider_name(&self) -> &'static str {
            "mock-spot"
        }
    }

    /// Supply provider returning one canned answer
    pub struct MockSupplyProvider {
        response: Mutex<Result<SupplyInfo, ProviderError>>,
        log: CallLog,
    }

    impl MockSupplyProvider {
        pub fn new(response: Result<SupplyInfo, ProviderError>) -> Self {
            Self {
                response: Mutex::new(response),
                log: CallLog::default(),
            }
        }

        pub fn set_response(&self, response: Result<SupplyInfo, ProviderError>) {
            *self.response.lock().unwrap() = response;
        }

        pub fn call_count(&self) -> usize {
            self.log.count()
        }
    }

    #[async_trait]
    impl SupplyProvider for MockSupplyProvider {
        async fn fetch_supply(&self, _symbol: &str) -> Result<SupplyInfo, ProviderError> {
            self.log.hit();
            match &*self.response.lock().unwrap() {
                Ok(info) => Ok(info.clone()),
                Err(err) => Err(replay(err)),
            }
        }

        fn provider_name(&self) -> &'static str {
            "mock-supply"
        }
    }

    /// Market provider answering from per-currency snapshots
    pub struct MockMarketProvider {
        snapshots: Mutex<HashMap<String, MarketSnapshot>>,
        error: Mutex<Option<ProviderError>>,
        log: CallLog,
    }

    impl MockMarketProvider {
        pub fn new() -> Self {
            Self {
                snapshots: Mutex::new(HashMap::new()),
                error: Mutex::new(None),
                log: CallLog::default(),
            }
        }

        pub fn failing(error: ProviderError) -> Self {
            let provider = Self::new();
            provider.set_error(error);
            provider
        }

        pub fn set_snapshot(&self, currency_code: &str, snapshot: MarketSnapshot) {
            self.snapshots
                .lock()
                .unwrap()
                .insert(currency_code.to_string(), snapshot);
        }

        pub fn set_error(&self, error: ProviderError) {
            *self.error.lock().unwrap() = Some(error);
        }

        pub fn call_count(&self) -> usize {
            self.log.count()
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockMarketProvider {
        async fn fetch_markets(
            &self,
            _symbol: &str,
            currency_codes: &[String],
        ) -> Result<MarketSnapshots, ProviderError> {
            self.log.hit();
            if let Some(err) = self.error.lock().unwrap().as_ref() {
                return Err(replay(err));
            }

            let snapshots = self.snapshots.lock().unwrap();
            currency_codes
                .iter()
                .map(|code| {
                    snapshots
                        .get(code)
                        .cloned()
                        .map(|snapshot| (code.clone(), snapshot))
                        .ok_or_else(|| ProviderError::UnsupportedCurrency(code.clone()))
                })
                .collect()
        }

        fn provider_name(&self) -> &'static str {
            "mock-market"
        }
    }

    /// Symbol directory whose listing can be swapped between refreshes
    pub struct MockDirectory {
        listing: Mutex<Result<Vec<SymbolMapping>, ProviderError>>,
        log: CallLog,
    }

    impl MockDirectory {
        pub fn new(listing: Vec<SymbolMapping>) -> Self {
            Self {
                listing: Mutex::new(Ok(listing)),
                log: CallLog::default(),
            }
        }

        pub fn set_listing(&self, listing: Result<Vec<SymbolMapping>, ProviderError>) {
            *self.listing.lock().unwrap() = listing;
        }

        pub fn call_count(&self) -> usize {
            self.log.count()
        }
    }

    #[async_trait]
    impl SymbolDirectory for MockDirectory {
        async fn fetch_directory(&self) -> Result<Vec<SymbolMapping>, ProviderError> {
            self.log.hit();
            match &*self.listing.lock().unwrap() {
                Ok(listing) => Ok(listing.clone()),
                Err(err) => Err(replay(err)),
            }
        }

        fn provider_name(&self) -> &'static str {
            "mock-directory"
        }
    }

    pub fn mapping(id: &str, ticker: &str, name: &str) -> SymbolMapping {
        SymbolMapping {
            internal_id: id.to_string(),
            ticker_symbol: ticker.to_string(),
            display_name: name.to_string(),
        }
    }

    pub fn supply(provider_name: &str, circulating: Decimal, max: Option<Decimal>) -> SupplyInfo {
        SupplyInfo {
            provider_name: provider_name.to_string(),
            circulating_supply: circulating,
            max_supply: max,
            last_updated: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    pub fn snapshot(price: Decimal, circulating: Decimal, last_updated: &str) -> MarketSnapshot {
        MarketSnapshot {
            price,
            market_cap: price * circulating,
            circulating_supply: circulating,
            max_supply: None,
            total_volume: None,
            last_updated: last_updated.to_string(),
        }
    }
}
