use lokalise_manager::{DownloadBundle, ProcessStatus, QueuedProcess, RemoteApi, RemoteError, UploadRequest};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::responses::{AsyncDownloadResponse, BundleResponse, ProcessResponse, error_message};

pub const DEFAULT_API_HOST: &str = "https://api.lokalise.com/api2";

/// HTTP client for the Lokalise API v2.
///
/// Authenticates with `X-Api-Token` for API tokens, or with a bearer
/// header when the token came from an OAuth2 flow.
#[derive(Clone)]
pub struct LokaliseClient {
    client: reqwest::Client,
    token: String,
    oauth2: bool,
    api_host: String,
}

impl LokaliseClient {
    pub fn new(client: reqwest::Client, token: impl Into<String>, oauth2: bool) -> Self {
        Self {
            client,
            token: token.into(),
            oauth2,
            api_host: DEFAULT_API_HOST.to_owned(),
        }
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    fn project_url(&self, project_ref: &str, tail: &str) -> String {
        format!("{}/projects/{}/{}", self.api_host, project_ref, tail)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.oauth2 {
            req.header("Authorization", format!("Bearer {}", self.token))
        } else {
            req.header("X-Api-Token", &self.token)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = self
            .authorize(req)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RemoteError::network(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::network(format!("failed to read response body: {e}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let message = error_message(&body).unwrap_or_else(|| "Too many requests".into());
            return Err(RemoteError::rate_limited(message));
        }

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
            return Err(RemoteError::rejected(status.as_u16(), message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            RemoteError::malformed(format!("unexpected response body: {e}")).with_status(status.as_u16())
        })
    }
}

#[async_trait::async_trait]
impl RemoteApi for LokaliseClient {
    async fn upload_file(
        &self,
        project_ref: &str,
        request: &UploadRequest,
    ) -> Result<QueuedProcess, RemoteError> {
        let url = self.project_url(project_ref, "files/upload");
        debug!(%url, filename = %request.filename, "uploading file");

        let response: ProcessResponse = self
            .send(self.client.post(&url).json(&request.to_body()))
            .await?;
        Ok(response.process.into())
    }

    async fn download_files(
        &self,
        project_ref: &str,
        options: &Map<String, Value>,
    ) -> Result<DownloadBundle, RemoteError> {
        let url = self.project_url(project_ref, "files/download");
        debug!(%url, "requesting bundle");

        let response: BundleResponse = self.send(self.client.post(&url).json(options)).await?;
        Ok(DownloadBundle {
            bundle_url: response.bundle_url,
        })
    }

    async fn download_files_async(
        &self,
        project_ref: &str,
        options: &Map<String, Value>,
    ) -> Result<QueuedProcess, RemoteError> {
        let url = self.project_url(project_ref, "files/async-download");
        debug!(%url, "requesting asynchronous bundle");

        let response: AsyncDownloadResponse =
            self.send(self.client.post(&url).json(options)).await?;
        Ok(QueuedProcess::new(response.process_id, ProcessStatus::Queued))
    }

    async fn queued_process(
        &self,
        project_ref: &str,
        process_id: &str,
    ) -> Result<QueuedProcess, RemoteError> {
        let url = self.project_url(project_ref, &format!("processes/{process_id}"));

        let response: ProcessResponse = self.send(self.client.get(&url)).await?;
        Ok(response.process.into())
    }
}
