//! Paginated order export.
//!
//! Walks every page of the upstream order listing, re-checks each record
//! against the requested date window, and emits CSV bytes into a channel
//! as pages arrive. Memory use stays bounded by one upstream page; the
//! receiving end streams the bytes to the client.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{BridgeError, Result};
use crate::fulfilment::FulfilmentApi;

/// Hard upper bound on page fetches per export. Guarantees termination
/// even when the upstream pagination signals are inconsistent or cyclic.
pub const MAX_PAGE_FETCHES: u32 = 2000;

/// Default page size for the upstream listing.
pub const DEFAULT_PER_PAGE: u64 = 200;

/// Largest page size the upstream accepts.
pub const MAX_PER_PAGE: u64 = 1000;

/// UTF-8 byte-order mark, hints the encoding to spreadsheet readers.
pub const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fixed export header. One row per line item; orders without line items
/// get a single row with the line item columns empty.
pub const EXPORT_HEADER: [&str; 23] = [
    "order_uuid",
    "order_reference",
    "status",
    "ordered_at",
    "paid_at",
    "payment_method",
    "customer_name",
    "ship_fullname",
    "ship_address_line_1",
    "ship_postal_code",
    "ship_city",
    "ship_state",
    "ship_country",
    "shipment_barcode",
    "track_and_trace_url",
    "shipped_at",
    "line_item_uuid",
    "line_item_title",
    "line_item_foreign_id",
    "amount",
    "unit_price",
    "paid_total",
    "paid_tax",
];

/// Caller-supplied export filter, resolved once from the raw query string
/// and immutable for the duration of the export.
#[derive(Debug, Clone)]
pub struct ExportQuery {
    /// Local date window re-checked against every record.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Page size requested from the upstream listing, clamped to [1, 1000].
    pub per_page: u64,
    /// Filters forwarded verbatim to the upstream listing. The date bounds
    /// stay in here too; the local window is defense in depth on top of
    /// the upstream filter.
    pub passthrough: Vec<(String, String)>,
}

impl ExportQuery {
    /// Resolves the raw query parameters. Date-only bounds expand to the
    /// start or end of that day in UTC; full timestamps pass through.
    /// Pagination keys are stripped since the driver owns page state.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self> {
        let per_page = params
            .get("per_page")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let from = match params.get("ordered_at_from") {
            Some(raw) => Some(parse_date_bound(raw, false).ok_or_else(|| {
                BridgeError::Validation(format!("Invalid ordered_at_from: {raw}"))
            })?),
            None => None,
        };
        let to = match params.get("ordered_at_to") {
            Some(raw) => Some(parse_date_bound(raw, true).ok_or_else(|| {
                BridgeError::Validation(format!("Invalid ordered_at_to: {raw}"))
            })?),
            None => None,
        };

        let mut passthrough: Vec<(String, String)> = params
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "per_page" | "page" | "cursor" | "limit"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !params.contains_key("status") {
            passthrough.push(("status".to_string(), "completed".to_string()));
        }

        Ok(Self {
            from,
            to,
            per_page,
            passthrough,
        })
    }
}

/// Parses a date bound. `YYYY-MM-DD` expands to day start (or day end for
/// the upper bound) in UTC; anything else must be a full timestamp.
pub(crate) fn parse_date_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        let naive = if end_of_day {
            date.and_hms_opt(23, 59, 59)?
        } else {
            date.and_hms_opt(0, 0, 0)?
        };
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    parse_order_timestamp(raw.trim())
}

/// Timestamp formats seen in upstream order records.
fn parse_order_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

/// Re-checks a record's ordered_at against the requested window. The
/// upstream date filter is not trusted to be exact.
pub fn within_window(
    ordered_at: &str,
    from: Option<&DateTime<Utc>>,
    to: Option<&DateTime<Utc>>,
) -> bool {
    let Some(ts) = parse_order_timestamp(ordered_at.trim()) else {
        // An unparseable timestamp only passes an unbounded window
        return from.is_none() && to.is_none();
    };
    if let Some(from) = from {
        if ts < *from {
            return false;
        }
    }
    if let Some(to) = to {
        if ts > *to {
            return false;
        }
    }
    true
}

/// How the next listing request is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Number(u64),
    Cursor(String),
}

impl PageState {
    fn page_number(&self) -> u64 {
        match self {
            PageState::Number(page) => *page,
            PageState::Cursor(_) => 1,
        }
    }

    fn query_params(&self, per_page: u64) -> Vec<(String, String)> {
        match self {
            PageState::Number(page) => vec![
                ("page".to_string(), page.to_string()),
                ("per_page".to_string(), per_page.to_string()),
            ],
            PageState::Cursor(cursor) => vec![
                ("cursor".to_string(), cursor.clone()),
                ("limit".to_string(), per_page.to_string()),
            ],
        }
    }
}

/// Pagination signal found in a listing response, in detection priority
/// order. The upstream pagination shape is not stable across endpoints,
/// so every response is classified on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    /// Cursor-based pagination; `None` means the cursor chain ended.
    Cursor(Option<String>),
    /// Boolean "has next" link flag.
    NextLink(bool),
    /// Explicit page count metadata.
    TotalPages { current: u64, total: u64 },
    /// No usable metadata; fall back to the short-page heuristic.
    None,
}

/// Reads the pagination signal out of a listing response. Metadata may
/// live under `orders.meta`, `meta`, or `orders.links`.
pub fn detect_page_signal(body: &Value) -> PageSignal {
    let candidates = [
        body.pointer("/orders/meta"),
        body.get("meta"),
        body.pointer("/orders/links"),
    ];
    let metas: Vec<&Value> = candidates
        .into_iter()
        .flatten()
        .filter(|value| value.is_object())
        .collect();

    for meta in &metas {
        for key in ["next_cursor", "cursor"] {
            if let Some(value) = meta.get(key) {
                return match value.as_str() {
                    Some(cursor) if !cursor.is_empty() => {
                        PageSignal::Cursor(Some(cursor.to_string()))
                    }
                    _ => PageSignal::Cursor(None),
                };
            }
        }
    }

    for meta in &metas {
        if let Some(next) = meta.get("next") {
            return match next {
                Value::Bool(flag) => PageSignal::NextLink(*flag),
                // Link-style metadata carries a URL; any non-null next
                // means more data
                Value::Null => PageSignal::NextLink(false),
                _ => PageSignal::NextLink(true),
            };
        }
    }

    for meta in &metas {
        let current = meta.get("current_page").and_then(Value::as_u64);
        let total = meta
            .get("last_page")
            .or_else(|| meta.get("total_pages"))
            .and_then(Value::as_u64);
        if let (Some(current), Some(total)) = (current, total) {
            return PageSignal::TotalPages { current, total };
        }
    }

    PageSignal::None
}

/// Decides the next page state, or `None` when the listing is exhausted.
pub fn next_page_state(
    signal: &PageSignal,
    current: &PageState,
    items_on_page: usize,
    per_page: u64,
) -> Option<PageState> {
    match signal {
        PageSignal::Cursor(Some(token)) => Some(PageState::Cursor(token.clone())),
        PageSignal::Cursor(None) => None,
        PageSignal::NextLink(true) => Some(PageState::Number(current.page_number() + 1)),
        PageSignal::NextLink(false) => None,
        PageSignal::TotalPages { current, total } => {
            if current < total {
                Some(PageState::Number(current + 1))
            } else {
                None
            }
        }
        PageSignal::None => {
            if (items_on_page as u64) < per_page {
                None
            } else {
                Some(PageState::Number(current.page_number() + 1))
            }
        }
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn field(value: &Value, path: &str) -> String {
    value.pointer(path).map(text).unwrap_or_default()
}

fn first_of(value: &Value, paths: &[&str]) -> String {
    for path in paths {
        if let Some(found) = value.pointer(path) {
            let rendered = text(found);
            if !rendered.is_empty() {
                return rendered;
            }
        }
    }
    String::new()
}

/// Flattens one order into its export rows: one per line item, or a single
/// row with empty line item columns when the order has none.
pub fn order_to_rows(order: &Value) -> Vec<Vec<String>> {
    let base = vec![
        first_of(order, &["/uuid", "/id"]),
        field(order, "/reference"),
        field(order, "/status"),
        field(order, "/ordered_at"),
        field(order, "/paid_at"),
        field(order, "/payment_method"),
        first_of(order, &["/customer_name", "/customer/name"]),
        field(order, "/shipping_address/fullname"),
        field(order, "/shipping_address/address_line_1"),
        field(order, "/shipping_address/postal_code"),
        field(order, "/shipping_address/city"),
        field(order, "/shipping_address/state"),
        field(order, "/shipping_address/country"),
        first_of(order, &["/shipment_barcode", "/track_and_trace_code"]),
        field(order, "/track_and_trace_url"),
        field(order, "/shipped_at"),
    ];

    let line_items = order
        .get("products")
        .or_else(|| order.get("line_items"))
        .and_then(Value::as_array);

    match line_items {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                let mut row = base.clone();
                row.push(first_of(item, &["/uuid", "/id"]));
                row.push(first_of(item, &["/title", "/name", "/product/name"]));
                row.push(first_of(item, &["/foreign_id", "/product/sku", "/sku"]));
                row.push(field(item, "/amount"));
                row.push(field(item, "/unit_price"));
                row.push(field(item, "/paid_total"));
                row.push(field(item, "/paid_tax"));
                row
            })
            .collect(),
        _ => {
            let mut row = base;
            row.extend(std::iter::repeat(String::new()).take(7));
            vec![row]
        }
    }
}

/// Serializes one record with quote-when-necessary escaping and a trailing
/// newline.
pub fn encode_csv_row(fields: &[String]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new().from_writer(&mut buf);
        writer.write_record(fields)?;
        writer.flush()?;
    }
    Ok(buf)
}

/// Drives a full export: fetches listing pages until the pagination signal
/// says stop, the page cap is hit, or the client goes away, and emits CSV
/// bytes into `tx` as pages arrive.
///
/// By the time the first byte is sent the response headers are committed,
/// so an upstream failure mid-export cannot become a clean error response;
/// the stream simply ends and the client receives a truncated CSV.
pub async fn run_export(api: &FulfilmentApi, query: &ExportQuery, tx: mpsc::Sender<Vec<u8>>) {
    if tx.send(BOM.to_vec()).await.is_err() {
        return;
    }

    let header: Vec<String> = EXPORT_HEADER.iter().map(|name| name.to_string()).collect();
    let header_row = match encode_csv_row(&header) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to encode export header: {e}");
            return;
        }
    };
    if tx.send(header_row).await.is_err() {
        return;
    }

    let mut state = PageState::Number(1);
    let mut fetched: u32 = 0;
    let mut emitted: u64 = 0;

    loop {
        if fetched >= MAX_PAGE_FETCHES {
            warn!("Export hit the {MAX_PAGE_FETCHES} page cap, stopping");
            break;
        }
        // A dropped receiver means the client disconnected; stop fetching
        if tx.is_closed() {
            debug!("Client went away, stopping export after {fetched} pages");
            return;
        }

        let mut params = query.passthrough.clone();
        params.extend(state.query_params(query.per_page));

        let page = match api.fetch_orders_page(&params).await {
            Ok(page) => page,
            Err(e) => {
                // Headers are long gone; ending the stream is all we can do
                warn!("Export aborted after {fetched} pages: {e}");
                return;
            }
        };
        fetched += 1;

        for order in &page.items {
            let ordered_at = field(order, "/ordered_at");
            if !within_window(&ordered_at, query.from.as_ref(), query.to.as_ref()) {
                continue;
            }
            for row in order_to_rows(order) {
                let encoded = match encode_csv_row(&row) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Failed to encode export row: {e}");
                        return;
                    }
                };
                if tx.send(encoded).await.is_err() {
                    debug!("Client went away, stopping export after {fetched} pages");
                    return;
                }
                emitted += 1;
            }
        }

        let signal = detect_page_signal(&page.body);
        match next_page_state(&signal, &state, page.items.len(), query.per_page) {
            Some(next) => state = next,
            None => break,
        }
    }

    info!("Export finished: {emitted} rows from {fetched} pages");
}
