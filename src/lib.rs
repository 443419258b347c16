//! Backoffice order bridge.
//!
//! Imports CSV order exports into the external fulfilment API and streams
//! filtered order listings back out as CSV downloads.

pub mod csv_ingest;
pub mod error;
pub mod export;
pub mod fulfilment;
pub mod import;
pub mod models;
pub mod transform;
pub mod web;

pub use error::{BridgeError, Result};
pub use fulfilment::FulfilmentApi;
