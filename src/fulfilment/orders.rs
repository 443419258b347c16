//! Order submission and paged order listing against the fulfilment API.

use log::{debug, error};
use serde::Serialize;
use serde_json::Value;

use super::FulfilmentApi;
use crate::error::{BridgeError, Result};
use crate::models::OrderSubmission;

/// `POST /order` body wrapper expected by the upstream API.
#[derive(Debug, Serialize)]
struct OrderEnvelope<'a> {
    order: &'a OrderSubmission,
}

/// One fetched listing page: the decoded order objects plus the raw body
/// the pagination metadata is read from.
#[derive(Debug)]
pub struct OrdersPage {
    pub items: Vec<Value>,
    pub body: Value,
}

impl FulfilmentApi {
    /// Submits one transformed order and returns the upstream
    /// acknowledgement body.
    pub async fn submit_order(&self, submission: &OrderSubmission) -> Result<Value> {
        let url = format!("{}/order", self.base_url);
        debug!("Submitting order {} to {url}", submission.id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(&OrderEnvelope { order: submission })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Order {} rejected with status {status}: {body}", submission.id);
            return Err(BridgeError::Upstream { status, body });
        }

        Ok(response.json().await?)
    }

    /// Fetches one page of the order listing. `params` carries the filter
    /// and pagination query parameters verbatim.
    pub async fn fetch_orders_page(&self, params: &[(String, String)]) -> Result<OrdersPage> {
        let url = format!("{}/orders", self.base_url);
        debug!("Fetching orders page from {url} with {} params", params.len());

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

        let body: Value = response.json().await?;
        let items = extract_order_items(&body);
        Ok(OrdersPage { items, body })
    }
}

/// The order list may sit under `orders.data`, `orders`, or `data`
/// depending on the upstream endpoint variant.
pub(crate) fn extract_order_items(body: &Value) -> Vec<Value> {
    let candidates = [
        body.pointer("/orders/data"),
        body.get("orders"),
        body.get("data"),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(list) = candidate.as_array() {
            return list.clone();
        }
    }
    Vec::new()
}
