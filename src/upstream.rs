// src/upstream.rs
//
// HTTP client for the upstream record service. Auth issuance, rate
// limiting and upload handling all live upstream; this client only pulls
// record collections for a date range, once per inbound request.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::records::{ActivityRecord, DailyTargetReportRecord, HourlyReportRecord};
use crate::store::{ActivityStore, ReportingStore, StoreError};

const ACTIVITIES_PATH: &str = "activities";
const HOURLY_REPORTS_PATH: &str = "hourly-reports";
const DAILY_REPORTS_PATH: &str = "daily-reports";

fn default_timeout_secs() -> u64 {
    10
}

/// Connection settings, read from `UPSTREAM_*` environment variables
/// (`UPSTREAM_BASE_URL`, `UPSTREAM_TIMEOUT_SECS`, `UPSTREAM_API_TOKEN`).
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, UpstreamError> {
        Ok(envy::prefixed("UPSTREAM_").from_env::<UpstreamConfig>()?)
    }
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("missing or invalid upstream configuration: {0}")]
    Config(#[from] envy::Error),
    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("HTTP request to record service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("record service returned {status}: {message:?}")]
    Api {
        status: StatusCode,
        message: Option<String>,
    },
}

/// Thin typed client over the record service's JSON endpoints.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        // Trailing slash matters for Url::join.
        let normalized = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };
        let base_url = Url::parse(&normalized)?;
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        info!("Record service client configured for {}", base_url);
        Ok(Self {
            http_client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    async fn get_records<T: DeserializeOwned>(
        &self,
        path: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<T>, UpstreamError> {
        let url = self.base_url.join(path)?;
        let mut request = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("fromDate", from.format("%Y-%m-%d").to_string()),
                ("toDate", to.format("%Y-%m-%d").to_string()),
            ]);
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<Vec<T>>().await?)
        } else {
            let message = response.text().await.ok();
            error!(
                "Record service request to /{} failed. Status: {}, Body: {:?}",
                path, status, message
            );
            Err(UpstreamError::Api { status, message })
        }
    }
}

#[async_trait]
impl ActivityStore for UpstreamClient {
    async fn activities_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        Ok(self.get_records(ACTIVITIES_PATH, from, to).await?)
    }
}

#[async_trait]
impl ReportingStore for UpstreamClient {
    async fn hourly_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HourlyReportRecord>, StoreError> {
        Ok(self.get_records(HOURLY_REPORTS_PATH, from, to).await?)
    }

    async fn daily_reports_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyTargetReportRecord>, StoreError> {
        Ok(self.get_records(DAILY_REPORTS_PATH, from, to).await?)
    }
}
