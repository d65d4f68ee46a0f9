//! Ticker to provider-id resolution backed by a refreshable snapshot

use crate::{error::ProviderError, provider::SymbolDirectory, types::SymbolMapping};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Normalizes a ticker the way the directory lists it (`" BTC"` -> `"btc"`)
pub fn normalize_ticker(symbol: &str) -> String {
    symbol.trim().to_lowercase()
}

/// Storage for the symbol directory snapshot
///
/// `replace_all` must swap the whole collection at once so a concurrent
/// `find` sees either the old or the new snapshot.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    async fn replace_all(&self, mappings: Vec<SymbolMapping>);

    /// Looks up a normalized ticker
    async fn find(&self, ticker: &str) -> Option<SymbolMapping>;

    async fn count(&self) -> usize;
}

type Snapshot = Arc<HashMap<String, SymbolMapping>>;

/// In-memory [`SymbolStore`] holding an immutable snapshot behind a lock
#[derive(Default)]
pub struct InMemorySymbolStore {
    snapshot: RwLock<Snapshot>,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SymbolStore for InMemorySymbolStore {
    async fn replace_all(&self, mappings: Vec<SymbolMapping>) {
        let mut next = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            // First listing of a ticker wins
            next.entry(normalize_ticker(&mapping.ticker_symbol))
                .or_insert(mapping);
        }

        // Build outside the lock; hold it only for the swap
        let next = Arc::new(next);
        *self.snapshot.write().await = next;
    }

    async fn find(&self, ticker: &str) -> Option<SymbolMapping> {
        let snapshot = self.snapshot.read().await.clone();
        snapshot.get(ticker).cloned()
    }

    async fn count(&self) -> usize {
        self.snapshot.read().await.len()
    }
}

/// Resolves tickers to provider ids and keeps the directory fresh
pub struct SymbolResolver {
    directory: Arc<dyn SymbolDirectory>,
    store: Arc<dyn SymbolStore>,
}

impl SymbolResolver {
    pub fn new(directory: Arc<dyn SymbolDirectory>, store: Arc<dyn SymbolStore>) -> Self {
        Self { directory, store }
    }

    /// Creates a resolver with an empty in-memory store
    pub fn in_memory(directory: Arc<dyn SymbolDirectory>) -> Self {
        Self::new(directory, Arc::new(InMemorySymbolStore::new()))
    }

    /// Returns the provider id for `symbol`
    ///
    /// A missing mapping is [`ProviderError::Unresolved`], which callers treat
    /// as the dependent provider being unavailable.
    pub async fn resolve(&self, symbol: &str) -> Result<String, ProviderError> {
        let ticker = normalize_ticker(symbol);
        match self.store.find(&ticker).await {
            Some(mapping) => Ok(mapping.internal_id),
            None => {
                tracing::debug!(symbol = %ticker, "No provider id mapped");
                Err(ProviderError::Unresolved(ticker))
            }
        }
    }

    /// Reloads the whole directory
    ///
    /// On any failure the current snapshot is kept and the error returned.
    /// Returns the number of mappings now loaded.
    pub async fn refresh(&self) -> Result<usize, ProviderError> {
        let mappings = self.directory.fetch_directory().await?;
        if mappings.is_empty() {
            return Err(ProviderError::invalid_response(format!(
                "{} returned an empty symbol directory",
                self.directory.provider_name()
            )));
        }

        let listed = mappings.len();
        self.store.replace_all(mappings).await;
        let loaded = self.store.count().await;

        tracing::info!(
            provider = self.directory.provider_name(),
            listed,
            loaded,
            "Refreshed symbol directory"
        );
        Ok(loaded)
    }

    /// Number of tickers currently resolvable
    pub async fn mapping_count(&self) -> usize {
        self.store.count().await
    }
}
