//! Maps raw CSV order rows onto the fulfilment API's nested submission
//! shape.

use std::collections::HashMap;

use crate::models::{CsvOrderRow, OrderLine, OrderSubmission, ProductRef, ShippingAddress};

/// Joins street, house number and number addition into one address line.
/// Empty parts are skipped, the rest joined by single spaces.
pub fn join_address_line_1(street: &str, number: &str, addition: &str) -> String {
    [street, number, addition]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numeric coercion for string CSV fields. Non-numeric input yields 0 so a
/// bad value degrades the row instead of failing the batch.
pub fn coerce_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

/// Builds the order submission for one CSV row.
///
/// The product id comes from the SKU cache map keyed by EAN; an unknown EAN
/// leaves the id unset. Operational metadata travels as a flat list of
/// human-readable strings in `additional_information`.
pub fn transform_order_row(
    row: &CsvOrderRow,
    product_map: &HashMap<String, u64>,
    fulfilment_client_id: u32,
) -> OrderSubmission {
    let first = row.customer_firstname.trim();
    let last = row.customer_lastname.trim();
    let fullname = format!("{first} {last}").trim().to_string();

    let amount = coerce_number(&row.quantity);
    let unit_price = coerce_number(&row.cost_price);
    let product_id = product_map.get(row.ean.trim()).copied();

    OrderSubmission {
        id: row.order_id.trim().to_string(),
        shipping_address: ShippingAddress {
            fullname,
            address_line_1: join_address_line_1(
                &row.shipping_address_street,
                &row.shipping_address_number,
                &row.shipping_address_number_addition,
            ),
            postal_code: row.shipping_address_postcode.trim().to_string(),
            city: row.shipping_address_city.trim().to_string(),
            country: row.shipping_address_country.trim().to_uppercase(),
        },
        email: row.customer_email.trim().to_string(),
        billing_address: None,
        products: vec![OrderLine {
            product: ProductRef {
                fulfilmentclient_id: fulfilment_client_id,
                product_id,
                sku: row.sku.trim().to_string(),
                expected_shipping_date: row.expected_shipping_date.trim().to_string(),
                shipped_at: row.shipping_date.trim().to_string(),
            },
            amount,
            additional_information: vec![
                format!("Qty Shipped: {}", row.qty_shipped.trim()),
                format!("Shipper: {}", row.shipper.trim()),
                format!("Track And Trace Code: {}", row.track_and_trace_code.trim()),
                format!("Track And Trace Url: {}", row.track_and_trace_url.trim()),
                format!("EAN: {}", row.ean.trim()),
            ],
            unit_price,
            paid_total: unit_price * amount,
        }],
        ordered_at: row.order_date.trim().to_string(),
    }
}
