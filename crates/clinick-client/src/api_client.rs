//! HTTP client for communicating with the Clinick backend

use crate::backend::ReportBackend;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use clinick_core::config::ApiConfig;
use clinick_core::{MonthFilter, NewReport, Report, ReportId};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tracing::{debug, warn};

/// API client for the incident backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client with default transport settings
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute URL that can carry a path.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a client from configuration, applying the request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(config: &ApiConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| ClientError::Request {
                endpoint: "client setup".to_string(),
                source,
            })?;
        Self::with_client(client, &config.base_url)
    }

    fn with_client(client: Client, base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        Ok(Self { client, base_url })
    }

    /// Configured base URL
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL below the base URL
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Download URL for the server-rendered CSV of one month
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL cannot be built.
    pub fn export_csv_url(&self, filter: MonthFilter) -> ClientResult<Url> {
        let mut url = self.endpoint(&["export-reports"])?;
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
        Ok(url)
    }

    /// Fetch the server-rendered CSV of one month
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    pub async fn download_csv(&self, filter: MonthFilter) -> ClientResult<Vec<u8>> {
        let endpoint = "/export-reports";
        let url = self.export_csv_url(filter)?;
        debug!(%url, "Downloading CSV export");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        let response = check_status(endpoint, response)?;

        let body = response
            .bytes()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ReportBackend for ApiClient {
    async fn create_report(&self, report: &NewReport) -> ClientResult<()> {
        let endpoint = "/report";
        let url = self.endpoint(&["report"])?;

        let response = self
            .client
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        check_status(endpoint, response)?;

        debug!(location = %report.location, "Report created");
        Ok(())
    }

    async fn list_reports(
        &self,
        filter: Option<MonthFilter>,
        token: &str,
    ) -> ClientResult<Vec<Report>> {
        let endpoint = "/reports";
        let mut url = self.endpoint(&["reports"])?;
        if let Some(filter) = filter {
            url.query_pairs_mut().extend_pairs(filter.query_pairs());
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        let response = check_status(endpoint, response)?;

        let body: Value = response.json().await.map_err(|e| ClientError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        Ok(decode_report_list(body))
    }

    async fn mark_seen(&self, id: &ReportId) -> ClientResult<()> {
        let endpoint = "/reports/{id}/seen";
        let url = self.endpoint(&["reports", id.as_str(), "seen"])?;

        let response = self
            .client
            .put(url)
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        check_status(endpoint, response)?;
        Ok(())
    }

    async fn save_push_token(&self, token: &str) -> ClientResult<()> {
        let endpoint = "/save-token";
        let url = self.endpoint(&["save-token"])?;

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|source| request_error(endpoint, source))?;
        check_status(endpoint, response)?;
        Ok(())
    }

    fn name(&self) -> &str {
        self.base_url.as_str()
    }
}

fn request_error(endpoint: &str, source: reqwest::Error) -> ClientError {
    ClientError::Request {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn check_status(endpoint: &str, response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Decode a report list leniently
///
/// A body that is not an array yields no reports; entries that do not decode
/// are skipped so one bad record cannot blank the dashboard.
#[must_use]
pub fn decode_report_list(body: Value) -> Vec<Report> {
    let Value::Array(items) = body else {
        warn!("Report list response is not an array; treating as empty");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Report>(item) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed report");
                None
            }
        })
        .collect()
}
