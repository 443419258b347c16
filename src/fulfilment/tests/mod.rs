//! Tests for the fulfilment API client.


use std::time::Duration;

use super::FulfilmentApi;

/// Client pointed at a wiremock server.
pub(crate) fn api_with_mock(mock_uri: &str) -> FulfilmentApi {
    FulfilmentApi::new(
        mock_uri.to_string(),
        "test_token".to_string(),
        Duration::from_secs(5),
    )
    .unwrap()
}
