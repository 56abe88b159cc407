//! Direct HTTP calls for endpoints `scaleway-rs` does not cover.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{ScalewayProvider, ScalewayProviderError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: usize = 100;

/// Public Scaleway API endpoint.
pub(super) const SCALEWAY_API_BASE: &str = "https://api.scaleway.com";

/// Builds the HTTP client shared by every direct call.
pub(super) fn http_client() -> Result<reqwest::Client, ScalewayProviderError> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

impl ScalewayProvider {
    pub(super) fn instance_url(&self, path: &str) -> String {
        self.zone_url(&self.config.default_zone, path)
    }

    pub(super) fn zone_url(&self, zone: &str, path: &str) -> String {
        format!("{}/instance/v1/zones/{zone}/{path}", self.api_base)
    }

    pub(super) fn iam_url(&self, path: &str) -> String {
        format!("{}/iam/v1alpha1/{path}", self.api_base)
    }

    pub(super) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Auth-Token", &self.config.secret_access_key)
    }

    /// Sends a request and returns the status and raw body.
    pub(super) async fn send_raw(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ScalewayProviderError> {
        tracing::debug!(operation, "sending Scaleway API request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    /// Sends a request, failing on any non-success status.
    pub(super) async fn send_checked(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<Vec<u8>, ScalewayProviderError> {
        let (status, body) = self.send_raw(operation, builder).await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(api_error(operation, status, &body))
    }

    /// Sends a request and decodes the JSON response.
    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<T, ScalewayProviderError> {
        let body = self.send_checked(operation, builder).await?;
        decode(operation, &body)
    }

    /// Walks every page of a list endpoint and concatenates the items.
    pub(super) async fn fetch_all<L, T>(
        &self,
        operation: &str,
        url: &str,
        filters: &[(&str, &str)],
        items: impl Fn(L) -> Vec<T>,
    ) -> Result<Vec<T>, ScalewayProviderError>
    where
        L: DeserializeOwned,
    {
        let mut collected = Vec::new();
        let mut page = 1_usize;
        loop {
            let builder = self
                .request(Method::GET, url)
                .query(filters)
                .query(&[("page", page), ("per_page", PAGE_SIZE)]);
            let batch = items(self.send_json::<L>(operation, builder).await?);
            let last_page = batch.len() < PAGE_SIZE;
            collected.extend(batch);
            if last_page {
                return Ok(collected);
            }
            page += 1;
        }
    }
}

pub(super) fn api_error(operation: &str, status: StatusCode, body: &[u8]) -> ScalewayProviderError {
    ScalewayProviderError::Api {
        operation: operation.to_owned(),
        status: status.as_u16(),
        message: String::from_utf8_lossy(body).into_owned(),
    }
}

pub(super) fn decode<T: DeserializeOwned>(
    operation: &str,
    body: &[u8],
) -> Result<T, ScalewayProviderError> {
    serde_json::from_slice(body).map_err(|err| ScalewayProviderError::Decode {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}
