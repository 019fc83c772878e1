use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::backoff::Sleeper;
use crate::client::{ClientConfig, ClientFactory};
use crate::error::RemoteError;
use crate::remote::{DownloadBundle, ProcessStatus, QueuedProcess, RemoteApi, UploadRequest};
use crate::terminal::Terminal;

/// In-memory remote service for testing. Records every call and replays
/// scripted failures and process states.
#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, UploadRequest)>>,
    upload_errors: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    download_errors: Mutex<VecDeque<RemoteError>>,
    bundle_url: Mutex<String>,
    process_states: Mutex<VecDeque<QueuedProcess>>,
    upload_events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next upload of `filename` fails with `error`. Queue several to fail repeatedly.
    pub fn fail_upload(&self, filename: &str, error: RemoteError) {
        self.upload_errors
            .lock()
            .unwrap()
            .entry(filename.to_owned())
            .or_default()
            .push_back(error);
    }

    /// The next bundle request fails with `error`.
    pub fn fail_download(&self, error: RemoteError) {
        self.download_errors.lock().unwrap().push_back(error);
    }

    pub fn set_bundle_url(&self, url: impl Into<String>) {
        *self.bundle_url.lock().unwrap() = url.into();
    }

    /// States returned by successive `queued_process` calls. The last one repeats.
    pub fn push_process_state(&self, process: QueuedProcess) {
        self.process_states.lock().unwrap().push_back(process);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| *c == method).count()
    }

    pub fn uploads(&self) -> Vec<(String, UploadRequest)> {
        self.uploads.lock().unwrap().clone()
    }

    /// `start:<filename>` and `end:<filename>` for every upload, in the order they happened.
    pub fn upload_events(&self) -> Vec<String> {
        self.upload_events.lock().unwrap().clone()
    }

    /// Highest number of uploads observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_owned());
    }
}

#[async_trait::async_trait]
impl RemoteApi for FakeRemote {
    async fn upload_file(
        &self,
        project_ref: &str,
        request: &UploadRequest,
    ) -> Result<QueuedProcess, RemoteError> {
        self.record("upload_file");
        self.upload_events
            .lock()
            .unwrap()
            .push(format!("start:{}", request.filename));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::task::yield_now().await;

        let scripted = self
            .upload_errors
            .lock()
            .unwrap()
            .get_mut(&request.filename)
            .and_then(VecDeque::pop_front);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.upload_events
            .lock()
            .unwrap()
            .push(format!("end:{}", request.filename));

        self.uploads
            .lock()
            .unwrap()
            .push((project_ref.to_owned(), request.clone()));

        match scripted {
            Some(error) => Err(error),
            None => Ok(QueuedProcess::new(
                format!("upload-{}", request.filename),
                ProcessStatus::Queued,
            )),
        }
    }

    async fn download_files(
        &self,
        _project_ref: &str,
        _options: &Map<String, Value>,
    ) -> Result<DownloadBundle, RemoteError> {
        self.record("download_files");
        if let Some(error) = self.download_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(DownloadBundle {
            bundle_url: self.bundle_url.lock().unwrap().clone(),
        })
    }

    async fn download_files_async(
        &self,
        _project_ref: &str,
        _options: &Map<String, Value>,
    ) -> Result<QueuedProcess, RemoteError> {
        self.record("download_files_async");
        if let Some(error) = self.download_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(QueuedProcess::new("async-download", ProcessStatus::Queued))
    }

    async fn queued_process(
        &self,
        _project_ref: &str,
        process_id: &str,
    ) -> Result<QueuedProcess, RemoteError> {
        self.record("queued_process");
        let mut states = self.process_states.lock().unwrap();
        let process = if states.len() > 1 {
            states.pop_front()
        } else {
            states.front().cloned()
        };
        Ok(process.unwrap_or_else(|| QueuedProcess::new(process_id, ProcessStatus::Queued)))
    }
}

/// Hands out the same client every time and counts builds and resets.
pub struct FakeFactory {
    client: Arc<dyn RemoteApi>,
    builds: AtomicUsize,
    resets: AtomicUsize,
    last_config: Mutex<Option<ClientConfig>>,
}

impl FakeFactory {
    pub fn new(client: Arc<dyn RemoteApi>) -> Self {
        Self {
            client,
            builds: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<ClientConfig> {
        self.last_config.lock().unwrap().clone()
    }
}

impl ClientFactory for FakeFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteApi>, RemoteError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config.clone());
        Ok(Arc::clone(&self.client))
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Captures notices and answers prompts from a script.
#[derive(Default)]
pub struct ScriptedTerminal {
    notices: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(answer: impl Into<String>) -> Self {
        let terminal = Self::default();
        terminal.answers.lock().unwrap().push_back(answer.into());
        terminal
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Terminal for ScriptedTerminal {
    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_owned());
    }

    fn confirm(&self, prompt: &str) -> io::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer"))
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
