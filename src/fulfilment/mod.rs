//! Fulfilment API client module.
//!
//! Thin client over the upstream fulfilment REST API: order submission,
//! paged order listings, and the product catalog behind the SKU cache.

mod orders;
mod products;

pub use orders::OrdersPage;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;

use crate::error::Result;
use products::SkuCache;

/// Fulfilment API client. Owns the HTTP client (with a per-request timeout
/// so one slow upstream call cannot hang a whole batch or export) and the
/// shared SKU cache.
pub struct FulfilmentApi {
    pub(crate) client: Client,
    pub(crate) api_token: String,
    pub(crate) base_url: String,
    pub(crate) sku_cache: Arc<RwLock<SkuCache>>,
}

impl FulfilmentApi {
    /// Creates a new fulfilment API client.
    pub fn new(base_url: String, api_token: String, timeout: Duration) -> Result<Self> {
        log::info!("Creating fulfilment API client for {base_url}");
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_token,
            base_url,
            sku_cache: Arc::new(RwLock::new(SkuCache::default())),
        })
    }

    pub(crate) fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_token)
    }
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
