//! Product catalog fetching and the SKU -> product id cache.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use super::FulfilmentApi;
use crate::error::{BridgeError, Result};

/// Page size for the single-shot full catalog fetch.
const CATALOG_PAGE_SIZE: u64 = 99_999_999;

#[derive(Debug, Deserialize)]
struct CatalogProduct {
    id: u64,
    sku: String,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: Vec<CatalogProduct>,
}

/// Shared SKU -> product id mapping. A refresh builds the new map off to
/// the side and swaps the `Arc` wholesale, so readers observe either the
/// previous catalog or the new one, never a partially built map.
#[derive(Debug, Default)]
pub(crate) struct SkuCache {
    pub(crate) map: Option<Arc<HashMap<String, u64>>>,
}

impl FulfilmentApi {
    /// Returns the SKU -> product id map, fetching the full catalog when
    /// the cache is cold or `fresh` is requested.
    pub async fn sku_id_map(&self, fresh: bool) -> Result<Arc<HashMap<String, u64>>> {
        if !fresh {
            let cache = self.sku_cache.read().await;
            if let Some(map) = &cache.map {
                debug!("SKU cache hit with {} entries", map.len());
                return Ok(Arc::clone(map));
            }
        }

        info!("Fetching product catalog from fulfilment API");
        let url = format!("{}/products", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .query(&[("per_page", CATALOG_PAGE_SIZE.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream { status, body });
        }

        let catalog: CatalogResponse = response.json().await?;

        let mut map = HashMap::with_capacity(catalog.data.len());
        for product in catalog.data {
            map.insert(product.sku, product.id);
        }
        info!("Product catalog loaded with {} SKUs", map.len());

        let map = Arc::new(map);
        let mut cache = self.sku_cache.write().await;
        cache.map = Some(Arc::clone(&map));
        Ok(map)
    }

    /// Looks up a product id by SKU. On a miss the catalog is refreshed
    /// exactly once and the lookup retried, bounding catalog fetches for
    /// unknown SKUs.
    pub async fn product_id_by_sku(&self, sku: &str) -> Result<Option<u64>> {
        let map = self.sku_id_map(false).await?;
        if let Some(&id) = map.get(sku) {
            return Ok(Some(id));
        }

        let map = self.sku_id_map(true).await?;
        match map.get(sku) {
            Some(&id) => Ok(Some(id)),
            None => {
                warn!("SKU '{sku}' not present in the product catalog");
                Ok(None)
            }
        }
    }

    /// Passes a product listing query through to the upstream API and
    /// relays the JSON body.
    pub async fn list_products(&self, params: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/products", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream { status, body });
        }

        Ok(response.json().await?)
    }
}
