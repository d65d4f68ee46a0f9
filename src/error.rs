//! Error types for the quote aggregator

use thiserror::Error;

/// Errors that can occur when fetching data from an upstream provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Response could not be decoded or lacked a required field
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Symbol not recognized by this provider
    #[error("Asset not supported: {0}")]
    UnsupportedAsset(String),

    /// Currency code not quoted by this provider
    #[error("Currency not supported: {0}")]
    UnsupportedCurrency(String),

    /// Ticker has no provider-specific id in the symbol directory
    #[error("No provider id mapped for symbol {0}")]
    Unresolved(String),

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),
}

impl ProviderError {
    /// Classifies a transport error, keeping timeouts distinct
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::NetworkError(err)
        }
    }

    /// Creates an InvalidResponse error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// True when the provider says the symbol or currency does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedAsset(_) | Self::UnsupportedCurrency(_) | Self::Unresolved(_)
        )
    }
}

/// Fatal outcomes of a quote request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// The price-of-record does not know the symbol
    #[error("cryptocurrency {symbol} doesn't exist")]
    SymbolNotFound { symbol: String },

    /// The price-of-record has no rate for a requested currency
    #[error("Error cryptocurrency code {code}")]
    UnsupportedCurrency { code: String },

    /// Too many sources failed to populate the required metadata
    #[error("No metadata source available for {symbol}")]
    MergeImpossible { symbol: String },

    /// The price-of-record failed for a reason other than not-found
    #[error("Error getting cryptocurrency prices: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuoteError {
    /// Creates a SymbolNotFound error
    pub fn symbol_not_found(symbol: &str) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.to_string(),
        }
    }

    /// Creates an UnsupportedCurrency error
    pub fn unsupported_currency(code: &str) -> Self {
        Self::UnsupportedCurrency {
            code: code.to_string(),
        }
    }

    /// Creates a MergeImpossible error
    pub fn merge_impossible(symbol: &str) -> Self {
        Self::MergeImpossible {
            symbol: symbol.to_string(),
        }
    }

    /// Creates an Internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps a failure of the price-of-record onto the request outcome
    pub fn from_primary(symbol: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::UnsupportedAsset(_) => Self::symbol_not_found(symbol),
            ProviderError::UnsupportedCurrency(code) => Self::UnsupportedCurrency { code },
            other => Self::Upstream(other.to_string()),
        }
    }

    /// HTTP-equivalent status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SymbolNotFound { .. } | Self::UnsupportedCurrency { .. } => 404,
            Self::MergeImpossible { .. } | Self::Upstream(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

/// Invalid startup configuration
#[derive(Debug, Error)]
#[error("Invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
