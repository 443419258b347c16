use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw row of an uploaded order export, keyed by the external system's
/// column names. All fields arrive as strings; interpretation happens in the
/// transformer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsvOrderRow {
    #[serde(rename = "orderId")]
    pub order_id: String,

    #[serde(rename = "orderDate")]
    pub order_date: String,

    #[serde(rename = "shippingDate")]
    pub shipping_date: String,

    #[serde(rename = "qtyShipped")]
    pub qty_shipped: String,

    #[serde(rename = "shipper")]
    pub shipper: String,

    #[serde(rename = "trackAndTraceCode")]
    pub track_and_trace_code: String,

    #[serde(rename = "trackAndTraceUrl")]
    pub track_and_trace_url: String,

    #[serde(rename = "customerFirstname")]
    pub customer_firstname: String,

    #[serde(rename = "customerLastname")]
    pub customer_lastname: String,

    #[serde(rename = "shippingAddressStreet")]
    pub shipping_address_street: String,

    #[serde(rename = "shippingAddressNumber")]
    pub shipping_address_number: String,

    #[serde(rename = "shippingAddressNumberAddition")]
    pub shipping_address_number_addition: String,

    #[serde(rename = "shippingAddressPostcode")]
    pub shipping_address_postcode: String,

    #[serde(rename = "shippingAddressCity")]
    pub shipping_address_city: String,

    #[serde(rename = "shippingAddressCountry")]
    pub shipping_address_country: String,

    #[serde(rename = "customerEmail")]
    pub customer_email: String,

    #[serde(rename = "telephone")]
    pub telephone: String,

    #[serde(rename = "sku")]
    pub sku: String,

    #[serde(rename = "quantity")]
    pub quantity: String,

    #[serde(rename = "EAN")]
    pub ean: String,

    #[serde(rename = "costPrice")]
    pub cost_price: String,

    #[serde(rename = "name")]
    pub name: String,

    #[serde(rename = "expectedShippingDate")]
    pub expected_shipping_date: String,
}

/// Shipping address block of an order submission.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingAddress {
    pub fullname: String,
    pub address_line_1: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

/// Product reference inside a submitted line item.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRef {
    pub fulfilmentclient_id: u32,
    /// External product id resolved from the SKU cache. Left unset when the
    /// catalog does not know the EAN; the upstream API accepts that.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    pub sku: String,
    pub expected_shipping_date: String,
    pub shipped_at: String,
}

/// One line item of an order submission.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product: ProductRef,
    pub amount: f64,
    pub additional_information: Vec<String>,
    pub unit_price: f64,
    pub paid_total: f64,
}

/// Nested payload shape required by the fulfilment API's `POST /order`.
/// Constructed fresh per CSV row and discarded after submission.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSubmission {
    pub id: String,
    pub shipping_address: ShippingAddress,
    pub email: String,
    pub billing_address: Option<Value>,
    pub products: Vec<OrderLine>,
    pub ordered_at: String,
}

/// Per-row result of a batch import. A failed submission does not abort the
/// batch; the error travels back to the caller here instead.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRowOutcome {
    pub order_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
