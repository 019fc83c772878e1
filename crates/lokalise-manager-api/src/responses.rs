use lokalise_manager::{ProcessStatus, QueuedProcess};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Response from the upload endpoint and the process endpoint.
/// `POST /projects/{project}/files/upload`, `GET /projects/{project}/processes/{id}`
#[derive(Debug, Deserialize)]
pub struct ProcessResponse {
    pub process: ProcessPayload,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPayload {
    pub process_id: String,
    pub status: ProcessStatus,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<Map<String, Value>>,
}

impl From<ProcessPayload> for QueuedProcess {
    fn from(payload: ProcessPayload) -> Self {
        QueuedProcess {
            process_id: payload.process_id,
            status: payload.status,
            kind: payload.kind,
            message: payload.message.filter(|m| !m.is_empty()),
            details: payload.details.unwrap_or_default(),
        }
    }
}

/// `POST /projects/{project}/files/download`
#[derive(Debug, Deserialize)]
pub struct BundleResponse {
    pub bundle_url: String,
}

/// `POST /projects/{project}/files/async-download`
#[derive(Debug, Deserialize)]
pub struct AsyncDownloadResponse {
    pub process_id: String,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// The service's own error message, if the body carries one.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .map(|r| r.error.message)
        .or_else(|| {
            // Some endpoints put the message at the top level.
            serde_json::from_slice::<Value>(body)
                .ok()?
                .get("message")?
                .as_str()
                .map(str::to_owned)
        })
}
