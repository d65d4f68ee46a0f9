//! Reconciliation of partial provider outputs into per-currency quotes
//!
//! Strategy selection is a pure function of which providers answered:
//!
//! | spot | supply | market | strategy |
//! |------|--------|--------|----------|
//! | ok   | ok     | ok     | [`MergeStrategy::Full`] |
//! | ok   | fail   | ok     | [`MergeStrategy::MarketOnly`] |
//! | ok   | ok     | fail   | [`MergeStrategy::SupplyOnly`] |
//! | ok   | fail   | fail   | [`MergePlan::Impossible`] |
//! | fail | *      | *      | [`MergePlan::Impossible`] |

use crate::{
    constants::UNKNOWN_PROVIDER_NAME,
    error::QuoteError,
    types::{CachedAggregate, MarketSnapshots, Quote, SpotRates, SupplyInfo},
};
use rust_decimal::Decimal;

/// Which of the three providers answered for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessPattern {
    pub spot: bool,
    pub supply: bool,
    pub market: bool,
}

impl SuccessPattern {
    pub fn new(spot: bool, supply: bool, market: bool) -> Self {
        Self {
            spot,
            supply,
            market,
        }
    }
}

impl std::fmt::Display for SuccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let flag = |ok: bool| if ok { "ok" } else { "fail" };
        write!(
            f,
            "{}/{}/{}",
            flag(self.spot),
            flag(self.supply),
            flag(self.market)
        )
    }
}

/// Field-sourcing rule for a mergeable pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Spot price, supply metadata, market timestamps
    Full,
    /// Everything from the per-currency market data
    MarketOnly,
    /// Spot price with supply metadata
    SupplyOnly,
}

/// Outcome of strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    Merge(MergeStrategy),
    /// No strategy can populate the mandatory fields
    Impossible,
}

/// Selects the merge strategy for a success pattern
pub fn select_strategy(pattern: SuccessPattern) -> MergePlan {
    match (pattern.spot, pattern.supply, pattern.market) {
        (true, true, true) => MergePlan::Merge(MergeStrategy::Full),
        (true, false, true) => MergePlan::Merge(MergeStrategy::MarketOnly),
        (true, true, false) => MergePlan::Merge(MergeStrategy::SupplyOnly),
        (true, false, false) | (false, _, _) => MergePlan::Impossible,
    }
}

/// Provider outputs for one request; `None` marks a failed provider
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeInputs<'a> {
    pub rates: Option<&'a SpotRates>,
    pub supply: Option<&'a SupplyInfo>,
    pub markets: Option<&'a MarketSnapshots>,
}

impl MergeInputs<'_> {
    pub fn pattern(&self) -> SuccessPattern {
        SuccessPattern::new(
            self.rates.is_some(),
            self.supply.is_some(),
            self.markets.is_some(),
        )
    }
}

/// Market cap in the target currency of `price`
fn derive_market_cap(
    symbol: &str,
    circulating_supply: Decimal,
    price: Decimal,
) -> Result<Decimal, QuoteError> {
    circulating_supply
        .checked_mul(price)
        .ok_or_else(|| QuoteError::internal(format!("market cap overflow for {}", symbol)))
}

fn spot_rate(rates: &SpotRates, code: &str) -> Result<Decimal, QuoteError> {
    rates
        .rate(code)
        .ok_or_else(|| QuoteError::unsupported_currency(code))
}

/// Merges provider outputs into one quote per currency code, in request order
pub fn merge(
    symbol: &str,
    currency_codes: &[String],
    inputs: MergeInputs<'_>,
) -> Result<Vec<Quote>, QuoteError> {
    let pattern = inputs.pattern();
    let strategy = match select_strategy(pattern) {
        MergePlan::Merge(strategy) => strategy,
        MergePlan::Impossible => {
            tracing::warn!(symbol, pattern = %pattern, "No merge strategy for pattern");
            return Err(QuoteError::merge_impossible(symbol));
        }
    };
    tracing::debug!(symbol, pattern = %pattern, strategy = ?strategy, "Selected merge strategy");

    match (strategy, inputs.rates, inputs.supply, inputs.markets) {
        (MergeStrategy::Full, Some(rates), Some(supply), Some(markets)) => {
            merge_full(symbol, currency_codes, rates, supply, markets)
        }
        (MergeStrategy::MarketOnly, Some(_), _, Some(markets)) => {
            merge_market_only(symbol, currency_codes, markets)
        }
        (MergeStrategy::SupplyOnly, Some(rates), Some(supply), _) => {
            merge_supply_only(symbol, currency_codes, rates, supply)
        }
        _ => Err(QuoteError::merge_impossible(symbol)),
    }
}

fn merge_full(
    symbol: &str,
    currency_codes: &[String],
    rates: &SpotRates,
    supply: &SupplyInfo,
    markets: &MarketSnapshots,
) -> Result<Vec<Quote>, QuoteError> {
    // One timestamp for the whole response: the first requested currency's
    let last_updated = match currency_codes.first() {
        Some(first) => markets
            .get(first)
            .map(|m| m.last_updated.clone())
            .ok_or_else(|| QuoteError::merge_impossible(symbol))?,
        None => return Ok(Vec::new()),
    };

    currency_codes
        .iter()
        .map(|code| {
            let price = spot_rate(rates, code)?;
            Ok(Quote {
                symbol: symbol.to_string(),
                currency_code: code.clone(),
                price,
                market_cap: derive_market_cap(symbol, supply.circulating_supply, price)?,
                accumulated_trade_value_24h: markets.get(code).and_then(|m| m.total_volume),
                circulating_supply: supply.circulating_supply,
                max_supply: supply.max_supply,
                provider_name: supply.provider_name.clone(),
                last_updated: last_updated.clone(),
            })
        })
        .collect()
}

fn merge_market_only(
    symbol: &str,
    currency_codes: &[String],
    markets: &MarketSnapshots,
) -> Result<Vec<Quote>, QuoteError> {
    currency_codes
        .iter()
        .map(|code| {
            let market = markets
                .get(code)
                .ok_or_else(|| QuoteError::merge_impossible(symbol))?;
            Ok(Quote {
                symbol: symbol.to_string(),
                currency_code: code.clone(),
                price: market.price,
                market_cap: market.market_cap,
                accumulated_trade_value_24h: market.total_volume,
                circulating_supply: market.circulating_supply,
                max_supply: market.max_supply,
                provider_name: UNKNOWN_PROVIDER_NAME.to_string(),
                last_updated: market.last_updated.clone(),
            })
        })
        .collect()
}

fn merge_supply_only(
    symbol: &str,
    currency_codes: &[String],
    rates: &SpotRates,
    supply: &SupplyInfo,
) -> Result<Vec<Quote>, QuoteError> {
    currency_codes
        .iter()
        .map(|code| {
            let price = spot_rate(rates, code)?;
            Ok(Quote {
                symbol: symbol.to_string(),
                currency_code: code.clone(),
                price,
                market_cap: derive_market_cap(symbol, supply.circulating_supply, price)?,
                accumulated_trade_value_24h: None,
                circulating_supply: supply.circulating_supply,
                max_supply: supply.max_supply,
                provider_name: supply.provider_name.clone(),
                last_updated: supply.last_updated.clone(),
            })
        })
        .collect()
}

/// Builds quotes from live spot rates and cached metadata
///
/// Market cap is re-derived from the live price so it stays in the target
/// currency.
pub fn splice_cached(
    symbol: &str,
    currency_codes: &[String],
    rates: &SpotRates,
    cached: &CachedAggregate,
) -> Result<Vec<Quote>, QuoteError> {
    currency_codes
        .iter()
        .map(|code| {
            let price = spot_rate(rates, code)?;
            Ok(Quote {
                symbol: symbol.to_string(),
                currency_code: code.clone(),
                price,
                market_cap: derive_market_cap(symbol, cached.circulating_supply, price)?,
                accumulated_trade_value_24h: None,
                circulating_supply: cached.circulating_supply,
                max_supply: cached.max_supply,
                provider_name: cached.provider_name.clone(),
                last_updated: cached.last_updated.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{snapshot, supply};
    use crate::types::MarketSnapshot;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn codes() -> Vec<String> {
        vec!["USD".to_string(), "KRW".to_string()]
    }

    fn rates() -> SpotRates {
        SpotRates {
            rates: HashMap::from([
                ("USD".to_string(), dec!(50000)),
                ("KRW".to_string(), dec!(65000000)),
            ]),
        }
    }

    fn supply_info() -> SupplyInfo {
        supply("bitcoin", dec!(19000000), Some(dec!(21000000)))
    }

    fn markets() -> MarketSnapshots {
        let mut usd = snapshot(dec!(50100), dec!(19000100), "2024-01-01T00:00:05.000Z");
        usd.total_volume = Some(dec!(20000000000));
        usd.max_supply = Some(dec!(21000000));
        let krw: MarketSnapshot =
            snapshot(dec!(65100000), dec!(19000100), "2024-01-01T00:00:07.000Z");
        HashMap::from([("USD".to_string(), usd), ("KRW".to_string(), krw)])
    }

    #[test]
    fn test_strategy_table() {
        let cases = [
            ((true, true, true), MergePlan::Merge(MergeStrategy::Full)),
            ((true, false, true), MergePlan::Merge(MergeStrategy::MarketOnly)),
            ((true, true, false), MergePlan::Merge(MergeStrategy::SupplyOnly)),
            ((true, false, false), MergePlan::Impossible),
            ((false, true, true), MergePlan::Impossible),
            ((false, false, true), MergePlan::Impossible),
            ((false, true, false), MergePlan::Impossible),
            ((false, false, false), MergePlan::Impossible),
        ];

        for ((spot, supply, market), expected) in cases {
            let pattern = SuccessPattern::new(spot, supply, market);
            assert_eq!(select_strategy(pattern), expected, "pattern {}", pattern);
        }
    }

    #[test]
    fn test_full_merge() {
        let (rates, supply, markets) = (rates(), supply_info(), markets());
        let quotes = merge(
            "BTC",
            &codes(),
            MergeInputs {
                rates: Some(&rates),
                supply: Some(&supply),
                markets: Some(&markets),
            },
        )
        .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].currency_code, "USD");
        assert_eq!(quotes[1].currency_code, "KRW");

        for quote in &quotes {
            assert_eq!(quote.provider_name, "bitcoin");
            assert_eq!(quote.circulating_supply, dec!(19000000));
            assert_eq!(quote.max_supply, Some(dec!(21000000)));
            assert_eq!(quote.last_updated, "2024-01-01T00:00:05.000Z");
            assert_eq!(quote.market_cap, quote.circulating_supply * quote.price);
        }

        assert_eq!(quotes[0].price, dec!(50000));
        assert_eq!(quotes[1].price, dec!(65000000));
        assert_eq!(quotes[0].accumulated_trade_value_24h, Some(dec!(20000000000)));
        assert_eq!(quotes[1].accumulated_trade_value_24h, None);
    }

    #[test]
    fn test_market_only_merge() {
        let (rates, markets) = (rates(), markets());
        let quotes = merge(
            "BTC",
            &codes(),
            MergeInputs {
                rates: Some(&rates),
                supply: None,
                markets: Some(&markets),
            },
        )
        .unwrap();

        assert_eq!(quotes[0].price, dec!(50100));
        assert_eq!(quotes[0].market_cap, dec!(50100) * dec!(19000100));
        assert_eq!(quotes[0].circulating_supply, dec!(19000100));
        assert_eq!(quotes[0].max_supply, Some(dec!(21000000)));
        assert_eq!(quotes[1].price, dec!(65100000));
        assert_eq!(quotes[1].max_supply, None);
        assert_eq!(quotes[1].last_updated, "2024-01-01T00:00:07.000Z");
        assert!(quotes
            .iter()
            .all(|q| q.provider_name == UNKNOWN_PROVIDER_NAME));
    }

    #[test]
    fn test_supply_only_merge() {
        let (rates, supply) = (rates(), supply_info());
        let quotes = merge(
            "BTC",
            &codes(),
            MergeInputs {
                rates: Some(&rates),
                supply: Some(&supply),
                markets: None,
            },
        )
        .unwrap();

        assert_eq!(quotes.len(), 2);
        for quote in &quotes {
            assert_eq!(quote.provider_name, "bitcoin");
            assert_eq!(quote.last_updated, "2024-01-01T00:00:00.000Z");
            assert_eq!(quote.market_cap, dec!(19000000) * quote.price);
            assert_eq!(quote.accumulated_trade_value_24h, None);
        }
    }

    #[test]
    fn test_both_metadata_sources_failed() {
        let rates = rates();
        let err = merge(
            "BTC",
            &codes(),
            MergeInputs {
                rates: Some(&rates),
                supply: None,
                markets: None,
            },
        )
        .unwrap_err();

        assert_eq!(err, QuoteError::merge_impossible("BTC"));
    }

    #[test]
    fn test_spot_failure_is_fatal() {
        let (supply, markets) = (supply_info(), markets());
        let err = merge(
            "BTC",
            &codes(),
            MergeInputs {
                rates: None,
                supply: Some(&supply),
                markets: Some(&markets),
            },
        )
        .unwrap_err();

        assert_eq!(err, QuoteError::merge_impossible("BTC"));
    }

    #[test]
    fn test_splice_cached_rederives_market_cap() {
        let cached = CachedAggregate {
            market_cap: dec!(1),
            circulating_supply: dec!(19000000),
            max_supply: None,
            provider_name: "bitcoin".to_string(),
            last_updated: "2024-01-01T00:00:00.000Z".to_string(),
        };

        let quotes = splice_cached("BTC", &codes(), &rates(), &cached).unwrap();
        assert_eq!(quotes[0].market_cap, dec!(950000000000));
        assert_eq!(quotes[1].market_cap, dec!(1235000000000000));
        assert!(quotes.iter().all(|q| q.max_supply.is_none()));
    }
}
