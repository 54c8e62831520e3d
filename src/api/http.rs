use super::{ApiError, ScanApi};
use crate::model::{RateLimitStatus, ScanMode, ScanResult};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub struct HttpScanApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpScanApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(base_url).map_err(|e| ApiError::Address(format!("{}: {}", base_url, e)))?;
        // A base without a trailing slash would lose its last path segment on join.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    /// Probes every candidate concurrently and keeps the first one, in
    /// candidate order, that answers the liveness probe.
    pub async fn discover(candidates: &[String]) -> Result<Self, ApiError> {
        let apis: Vec<HttpScanApi> = candidates
            .iter()
            .filter_map(|candidate| match HttpScanApi::new(candidate) {
                Ok(api) => Some(api),
                Err(e) => {
                    warn!("Skipping API candidate: {}", e);
                    None
                }
            })
            .collect();

        let probes = join_all(apis.iter().map(|api| api.probe())).await;

        apis.into_iter()
            .zip(probes)
            .find_map(|(api, probe)| match probe {
                Ok(()) => Some(api),
                Err(e) => {
                    debug!("API candidate {} unavailable: {}", api.base_url(), e);
                    None
                }
            })
            .ok_or(ApiError::Unavailable)
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Builds `{base}{path}`, percent-encoding `target` into the `url` query
    /// parameter when given. `path` is taken relative to the base, so a base
    /// such as `http://host/api` keeps its `/api` prefix.
    pub fn endpoint(&self, path: &str, target: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Address(format!("{}{}: {}", self.base, path, e)))?;
        if let Some(target) = target {
            url.query_pairs_mut().append_pair("url", target);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn probe(&self) -> Result<(), ApiError> {
        let url = self.endpoint("/", None)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn scan(&self, url: &str, mode: ScanMode) -> Result<ScanResult, ApiError> {
        let endpoint = self.endpoint(mode.endpoint(), Some(url))?;
        self.get_json(endpoint).await
    }

    async fn rate_limits(&self) -> Result<RateLimitStatus, ApiError> {
        let endpoint = self.endpoint("/rate-limits", None)?;
        self.get_json(endpoint).await
    }
}
