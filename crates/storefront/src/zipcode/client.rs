//! HTTP client for the hosted ZIP code service.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use cartwheel_core::ZipCode;

use super::{ZipCodeLookup, ZipLocation};

/// Errors that can occur when calling the ZIP code service.
#[derive(Debug, Error)]
pub enum ZipCodeError {
    /// Request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a status we don't understand.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

#[derive(Deserialize)]
struct InfoResponse {
    city: String,
    state: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error_msg: String,
}

/// Client for `GET {base}/rest/{token}/info.json/{zip}/degrees`.
#[derive(Clone)]
pub struct HttpZipCodeClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl HttpZipCodeClient {
    /// Create a client. Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ZipCodeError::Http` if the HTTP client cannot be built.
    pub fn new(
        base_url: &url::Url,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ZipCodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            token,
        })
    }
}

#[async_trait]
impl ZipCodeLookup for HttpZipCodeClient {
    #[instrument(skip(self), fields(zip = %zip))]
    async fn lookup(&self, zip: &ZipCode) -> Result<Option<ZipLocation>, ZipCodeError> {
        let url = format!(
            "{}/rest/{}/info.json/{zip}/degrees",
            self.base_url,
            self.token.expose_secret()
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::OK {
            let info: InfoResponse =
                serde_json::from_str(&body).map_err(|_| ZipCodeError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                })?;
            debug!(city = %info.city, state = %info.state, "ZIP code resolved");
            return Ok(Some(ZipLocation {
                city: info.city,
                state: info.state,
            }));
        }

        if status == reqwest::StatusCode::NOT_FOUND
            && let Ok(err) = serde_json::from_str::<ErrorResponse>(&body)
            && err.error_msg == format!("Zip code \"{zip}\" not found.")
        {
            debug!("ZIP code not found");
            return Ok(None);
        }

        warn!(status = %status, "ZIP code service returned unexpected status");
        Err(ZipCodeError::UnexpectedStatus {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}
