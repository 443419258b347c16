//! CSV import pipeline: ingest, transform, submit sequentially.

use std::path::Path;

use log::{error, info, warn};

use crate::csv_ingest;
use crate::error::Result;
use crate::fulfilment::FulfilmentApi;
use crate::models::ImportRowOutcome;
use crate::transform::transform_order_row;

/// Runs a full import of the order export at `path`: parse, transform
/// against a fresh SKU map, then submit each order in input order.
///
/// Submissions are strictly sequential; a failed row does not abort the
/// batch but travels back in its outcome record.
pub async fn run_import(
    api: &FulfilmentApi,
    path: &Path,
    fulfilment_client_id: u32,
) -> Result<Vec<ImportRowOutcome>> {
    let rows = csv_ingest::read_order_rows(path)?;
    info!("Importing {} order rows", rows.len());

    // The catalog may have changed since the last batch; always start from
    // a fresh SKU map so resolved ids are not stale
    let product_map = api.sku_id_map(true).await?;

    let mut outcomes = Vec::with_capacity(rows.len());
    for row in &rows {
        let submission = transform_order_row(row, &product_map, fulfilment_client_id);
        if submission.products[0].product.product_id.is_none() {
            warn!(
                "Order {}: EAN '{}' not in the product catalog, submitting without product id",
                submission.id,
                row.ean.trim()
            );
        }

        match api.submit_order(&submission).await {
            Ok(ack) => outcomes.push(ImportRowOutcome {
                order_id: submission.id,
                success: true,
                response: Some(ack),
                error: None,
            }),
            Err(e) => {
                error!("Order {} failed to submit: {e}", submission.id);
                outcomes.push(ImportRowOutcome {
                    order_id: submission.id,
                    success: false,
                    response: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let failed = outcomes.iter().filter(|outcome| !outcome.success).count();
    if failed > 0 {
        warn!("Import finished with {failed}/{} failed rows", outcomes.len());
    } else {
        info!("Import finished: {} rows submitted", outcomes.len());
    }
    Ok(outcomes)
}
