use std::time::Duration;

use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::{ApiKey, Configuration};
use crate::error::{ApiError, ProbeError};
use crate::immich::assets::AlbumSummary;

const API_KEY_HEADER: &str = "x-api-key";
/// Previews come back as jpeg or webp depending on server settings.
const PREVIEW_ACCEPT: &str = "image/*";

/// Authenticated access to one photo server.
///
/// The underlying `reqwest::Client` is supplied by the caller and may be
/// shared with other instances; cloning this handle is cheap.
#[derive(Clone, Debug)]
pub struct ImmichClient {
    http: reqwest::Client,
    base: Url,
    api_key: ApiKey,
    request_timeout: Duration,
}

impl ImmichClient {
    pub fn new(
        http: reqwest::Client,
        host: &str,
        api_key: ApiKey,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let trimmed = host.trim().trim_end_matches('/');
        let base = Url::parse(trimmed).map_err(|_| ApiError::BaseUrl(host.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BaseUrl(host.to_string()));
        }
        Ok(Self {
            http,
            base,
            api_key,
            request_timeout,
        })
    }

    pub fn from_config(http: reqwest::Client, cfg: &Configuration) -> Result<Self, ApiError> {
        Self::new(http, &cfg.host, cfg.api_key.clone(), cfg.request_timeout)
    }

    pub fn host(&self) -> &str {
        self.base.as_str()
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejected cannot-be-a-base URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, self.api_key.expose())
    }

    pub async fn get_json(
        &self,
        segments: &[&str],
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(segments);
        debug!(%url, "GET json");
        let resp = self
            .authorized(self.http.get(url))
            .header(ACCEPT, "application/json")
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn post_json(&self, segments: &[&str], body: &Value) -> Result<Value, ApiError> {
        let url = self.endpoint(segments);
        debug!(%url, "POST json");
        let resp = self
            .authorized(self.http.post(url))
            .header(ACCEPT, "application/json")
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Download the display-sized rendition of one asset.
    pub async fn preview(&self, asset_id: &str, timeout: Duration) -> Result<Bytes, ApiError> {
        let url = self.endpoint(&["api", "assets", asset_id, "thumbnail"]);
        debug!(%url, "GET preview");
        let resp = self
            .authorized(self.http.get(url))
            .header(ACCEPT, PREVIEW_ACCEPT)
            .query(&[("size", "preview")])
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }
        Ok(resp.bytes().await?)
    }

    /// Check that the server is reachable and accepts the api key.
    pub async fn ping(&self) -> Result<(), ProbeError> {
        let resp = self
            .authorized(self.http.get(self.endpoint(&["api", "server", "ping"])))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|err| ProbeError::CannotConnect(err.to_string()))?;
        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ProbeError::InvalidAuth),
            other => Err(ProbeError::CannotConnect(format!("HTTP {other}"))),
        }
    }

    pub async fn albums(&self) -> Result<Vec<AlbumSummary>, ApiError> {
        let body = self.get_json(&["api", "albums"], &[]).await?;
        Ok(serde_json::from_value(body)?)
    }
}

async fn read_json(resp: Response) -> Result<Value, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Status(status));
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
