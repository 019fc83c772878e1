use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

/// Status of a queued process. The vocabulary belongs to the remote service;
/// anything unrecognized is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessStatus {
    Queued,
    PreProcessing,
    Running,
    PostProcessing,
    Finished,
    Failed,
    Cancelled,
    Other(String),
}

impl ProcessStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::PreProcessing => "pre_processing",
            Self::Running => "running",
            Self::PostProcessing => "post_processing",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ProcessStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => Self::Queued,
            "pre_processing" => Self::PreProcessing,
            "running" => Self::Running,
            "post_processing" => Self::PostProcessing,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(s),
        }
    }
}

impl From<ProcessStatus> for String {
    fn from(status: ProcessStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous job on the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedProcess {
    pub process_id: String,
    pub status: ProcessStatus,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl QueuedProcess {
    pub fn new(process_id: impl Into<String>, status: ProcessStatus) -> Self {
        Self {
            process_id: process_id.into(),
            status,
            kind: None,
            message: None,
            details: Map::new(),
        }
    }

    /// The bundle URL reported by a finished download process.
    pub fn download_url(&self) -> Option<&str> {
        self.details.get("download_url").and_then(Value::as_str)
    }
}

/// Result of a synchronous bundle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadBundle {
    pub bundle_url: String,
}

/// One file upload, Base64 payload included.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub data: String,
    pub filename: String,
    pub lang_iso: String,
    /// Static per-call options merged over the three fields above.
    pub options: Map<String, Value>,
}

impl UploadRequest {
    /// The request body sent to the service.
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("data".into(), Value::String(self.data.clone()));
        body.insert("filename".into(), Value::String(self.filename.clone()));
        body.insert("lang_iso".into(), Value::String(self.lang_iso.clone()));
        body.extend(self.options.clone());
        body
    }
}

/// The remote translation-management service.
#[async_trait::async_trait]
pub trait RemoteApi: Send + Sync {
    /// Queue a file upload.
    async fn upload_file(
        &self,
        project_ref: &str,
        request: &UploadRequest,
    ) -> Result<QueuedProcess, RemoteError>;

    /// Build a translation bundle and return its location.
    async fn download_files(
        &self,
        project_ref: &str,
        options: &Map<String, Value>,
    ) -> Result<DownloadBundle, RemoteError>;

    /// Start building a translation bundle in the background.
    async fn download_files_async(
        &self,
        project_ref: &str,
        options: &Map<String, Value>,
    ) -> Result<QueuedProcess, RemoteError>;

    /// Re-fetch a queued process.
    async fn queued_process(
        &self,
        project_ref: &str,
        process_id: &str,
    ) -> Result<QueuedProcess, RemoteError>;
}
