//! Shared HTTP plumbing for feed clients.

use super::traits::FeedError;
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build an HTTP client with an explicit request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}

/// GET a URL and decode its JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T, FeedError> {
    let response = http.get(url).send().await.map_err(|source| FeedError::Http {
        url: url.to_string(),
        source,
    })?;

    decode_json(url, response).await
}

/// Check the status and decode a JSON body.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    url: &str,
    response: Response,
) -> Result<T, FeedError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: url.to_string(),
            status,
        });
    }

    response.json::<T>().await.map_err(|e| FeedError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
