//! Supported-airline catalog
//!
//! Names shown by the intro placeholder come from the auxiliary HTTP API.
//! Nothing here is required for chatting, so failures degrade to an empty list.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct SupportedAirlines {
    airlines: Vec<String>,
}

pub struct CatalogClient {
    client: Client,
    endpoint: String,
}

impl CatalogClient {
    pub fn new(api_url: &str) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(CATALOG_TIMEOUT)
            .build()
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/supported-airlines", api_url.trim_end_matches('/')),
        })
    }

    pub async fn supported_airlines(&self) -> Result<Vec<String>, CatalogError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Request(format!("timeout: {e}"))
                } else {
                    CatalogError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Request(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(CatalogError::Status { status, body });
        }

        parse_airlines(&body)
    }
}

fn parse_airlines(body: &str) -> Result<Vec<String>, CatalogError> {
    let parsed: SupportedAirlines =
        serde_json::from_str(body).map_err(|e| CatalogError::Parse(e.to_string()))?;
    Ok(parsed
        .airlines
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// Fetch the catalog, logging and returning an empty list on any failure
pub async fn load_supported_airlines(api_url: &str) -> Vec<String> {
    let result = match CatalogClient::new(api_url) {
        Ok(client) => client.supported_airlines().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(airlines) => {
            tracing::debug!(count = airlines.len(), "Loaded supported airlines");
            airlines
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not load supported airlines");
            Vec::new()
        }
    }
}
