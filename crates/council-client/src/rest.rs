use council_core::{CouncilCatalog, HealthSnapshot};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

const CONFIG_PATH: &str = "/api/config";
const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

/// Read-only REST collaborators: the council catalog and the health probe.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: Url) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base, http })
    }

    /// Fetch the council catalog. Called once at startup; the catalog is
    /// immutable for the process lifetime.
    pub async fn fetch_catalog(&self) -> Result<CouncilCatalog, ApiError> {
        let url = self.base.join(CONFIG_PATH)?;
        let catalog = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(catalog)
    }

    /// Fetch one health snapshot.
    pub async fn fetch_health(&self) -> Result<HealthSnapshot, ApiError> {
        let url = self.base.join(HEALTH_PATH)?;
        let snapshot = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot)
    }
}
