use std::fmt;
use std::path::PathBuf;

/// Errors raised while resolving or validating task settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown configuration option(s): {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("{}", .0.join(" "))]
    Invalid(Vec<String>),

    #[error("invalid value for `{key}`: {message}")]
    BadValue { key: String, message: String },
}

/// What went wrong when talking to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The service asked us to slow down (HTTP 429).
    RateLimited,
    /// A structured response was expected but the body could not be decoded.
    MalformedResponse,
    /// The service refused the request (validation failure, auth, not found...).
    Rejected,
    /// The request never produced a response.
    Network,
}

impl RemoteErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::MalformedResponse)
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("rate limited"),
            Self::MalformedResponse => f.write_str("malformed response"),
            Self::Rejected => f.write_str("request rejected"),
            Self::Network => f.write_str("network error"),
        }
    }
}

/// A failed call to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::RateLimited, message).with_status(429)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::MalformedResponse, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Rejected, message).with_status(status)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Errors produced by the translation codec hooks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("failed to parse translations: {0}")]
    Parse(String),

    #[error("failed to serialize translations: {0}")]
    Serialize(String),

    #[error("cannot infer language: {0}")]
    Language(String),
}

/// Broad classification of an [`Error`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    TransientRemote,
    PermanentRemote,
    LocalIo,
    Codec,
    ImportProcess,
}

/// Errors returned by the export and import tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive: {0}")]
    Archive(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to download bundle: {0}")]
    Bundle(String),

    #[error("asynchronous download process failed")]
    ProcessFailed { process_id: String },

    #[error("asynchronous download process timed out after {attempts} tries")]
    ProcessTimeout { attempts: u32 },

    #[error("error while trying to upload {}: {source}", .path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to process {entry}: {source}")]
    Entry {
        entry: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn upload(path: impl Into<PathBuf>, source: Error) -> Self {
        Self::Upload {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn entry(entry: impl Into<String>, source: Error) -> Self {
        Self::Entry {
            entry: entry.into(),
            source: Box::new(source),
        }
    }

    /// The category of the underlying failure, looking through context wrappers.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Remote(e) if e.is_transient() => ErrorCategory::TransientRemote,
            Self::Remote(_) | Self::Bundle(_) => ErrorCategory::PermanentRemote,
            Self::Io { .. } | Self::Archive(_) => ErrorCategory::LocalIo,
            Self::Codec(_) => ErrorCategory::Codec,
            Self::ProcessFailed { .. } | Self::ProcessTimeout { .. } => {
                ErrorCategory::ImportProcess
            }
            Self::Upload { source, .. } | Self::Entry { source, .. } => source.category(),
        }
    }

    /// The innermost remote error, if this failure came from the remote service.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            Self::Upload { source, .. } | Self::Entry { source, .. } => source.remote(),
            _ => None,
        }
    }
}
