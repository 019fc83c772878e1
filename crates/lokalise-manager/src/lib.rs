pub mod backoff;
pub mod bundle;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod exporter;
pub mod hooks;
pub mod importer;
pub mod merge;
pub mod paths;
pub mod remote;
pub mod terminal;

pub use backoff::{Backoff, BackoffPolicy, Retryable, Sleeper, TokioSleeper};
pub use client::{ApiClient, ClientConfig, ClientFactory};
pub use codec::Translations;
pub use config::{BackoffSettings, Defaults, Overrides, Settings};
pub use error::{CodecError, ConfigError, Error, ErrorCategory, RemoteError, RemoteErrorKind};
pub use exporter::{Exporter, FileCandidate, UploadOutcome};
pub use hooks::Hooks;
pub use importer::Importer;
pub use remote::{DownloadBundle, ProcessStatus, QueuedProcess, RemoteApi, UploadRequest};
pub use terminal::{StdTerminal, Terminal};

use std::sync::Arc;

/// An exporter for `overrides` layered over `defaults`.
pub fn exporter(
    defaults: &Defaults,
    overrides: Overrides,
    factory: Arc<dyn ClientFactory>,
) -> Result<Exporter, ConfigError> {
    Ok(Exporter::new(Settings::build(defaults, overrides)?, factory))
}

/// An importer for `overrides` layered over `defaults`.
pub fn importer(
    defaults: &Defaults,
    overrides: Overrides,
    factory: Arc<dyn ClientFactory>,
) -> Result<Importer, ConfigError> {
    Ok(Importer::new(Settings::build(defaults, overrides)?, factory))
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
