use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backoff::{Backoff, Sleeper};
use crate::bundle;
use crate::client::{ApiClient, ClientFactory};
use crate::config::Settings;
use crate::error::Error;
use crate::paths::{normalize, safe_destination};
use crate::remote::{ProcessStatus, QueuedProcess, RemoteApi};
use crate::terminal::{StdTerminal, Terminal, is_affirmative};

/// Downloads a translation bundle and writes its files under the locales root.
pub struct Importer {
    settings: Settings,
    client: ApiClient,
    terminal: Arc<dyn Terminal>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Importer {
    pub fn new(settings: Settings, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            settings,
            client: ApiClient::new(factory),
            terminal: Arc::new(StdTerminal),
            sleeper: None,
        }
    }

    pub fn with_terminal(mut self, terminal: Arc<dyn Terminal>) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn api_client(&self) -> &ApiClient {
        &self.client
    }

    /// Run the import. Returns `false` if the user declined to overwrite a
    /// non-empty directory in safe mode, `true` once every file is written.
    pub async fn import(&self) -> Result<bool, Error> {
        self.settings.validate()?;

        if !self.proceed_when_safe_mode().await? {
            if !self.settings.silent_mode {
                self.terminal.notice("Task cancelled!");
            }
            return Ok(false);
        }

        let location = self.download_bundle().await?;
        let archive = bundle::fetch(&location).await?;
        let written = self.extract(&archive).await?;
        info!(files = written.len(), "import finished");

        if !self.settings.silent_mode {
            self.terminal.notice("Task complete!");
        }

        Ok(true)
    }

    async fn proceed_when_safe_mode(&self) -> Result<bool, Error> {
        let path = &self.settings.locales_path;
        if !self.settings.import_safe_mode {
            return Ok(true);
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Ok(true),
        }

        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let first = entries.next_entry().await.map_err(|e| Error::io(path, e))?;
        if first.is_none() {
            return Ok(true);
        }

        if !self.settings.silent_mode {
            self.terminal
                .notice(&format!("The target directory {} is not empty!", path.display()));
        }
        let answer = self
            .terminal
            .confirm("Enter Y to continue: ")
            .map_err(|e| Error::io("<stdin>", e))?;

        Ok(is_affirmative(&answer))
    }

    fn backoff(&self) -> Backoff {
        let backoff = Backoff::new(self.settings.backoff);
        match &self.sleeper {
            Some(sleeper) => backoff.with_sleeper(Arc::clone(sleeper)),
            None => backoff,
        }
    }

    /// Ask the service for a bundle and return where to fetch it from.
    async fn download_bundle(&self) -> Result<String, Error> {
        let api = self.client.get(&self.settings.client_config())?;
        let backoff = self.backoff();
        let project_ref = self.settings.project_ref();
        let options = &self.settings.import_opts;
        let max_retries = self.settings.max_retries_import;

        if !self.settings.import_async {
            let bundle = backoff
                .run(max_retries, || api.download_files(&project_ref, options))
                .await?;
            return Ok(bundle.bundle_url);
        }

        let process = backoff
            .run(max_retries, || api.download_files_async(&project_ref, options))
            .await?;
        debug!(process_id = %process.process_id, "waiting for asynchronous download");

        let process = self
            .wait_for_async_download(api.as_ref(), &backoff, &project_ref, &process.process_id)
            .await?;

        process
            .download_url()
            .map(str::to_owned)
            .ok_or_else(|| Error::Bundle("finished process reported no download URL".into()))
    }

    async fn wait_for_async_download(
        &self,
        api: &dyn RemoteApi,
        backoff: &Backoff,
        project_ref: &str,
        process_id: &str,
    ) -> Result<QueuedProcess, Error> {
        let max_retries = self.settings.max_retries_import;
        let attempts = u32::try_from(max_retries.max(0))
            .unwrap_or(u32::MAX)
            .saturating_add(1);

        for attempt in 0..attempts {
            let process = backoff
                .run(max_retries, || api.queued_process(project_ref, process_id))
                .await?;

            match process.status {
                ProcessStatus::Finished => return Ok(process),
                ProcessStatus::Failed => {
                    return Err(Error::ProcessFailed {
                        process_id: process_id.to_owned(),
                    });
                }
                ref status => debug!(attempt = attempt + 1, %status, "process not finished yet"),
            }

            if attempt + 1 < attempts {
                backoff.pause(attempt).await;
            }
        }

        Err(Error::ProcessTimeout { attempts })
    }

    /// Write every matching entry of a zip archive under the locales root.
    /// Entries that would land outside the root are skipped.
    pub async fn extract(&self, archive: &[u8]) -> Result<Vec<PathBuf>, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive))
            .map_err(|e| Error::Archive(e.to_string()))?;

        let root = &self.settings.locales_path;
        let root = normalize(&std::path::absolute(root).map_err(|e| Error::io(root, e))?);

        let mut written = Vec::new();
        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| Error::Archive(format!("cannot read entry #{index}: {e}")))?;

            if entry.is_dir() {
                continue;
            }

            let name = entry.name().to_owned();
            if !self.settings.proper_ext(Path::new(&name)) {
                continue;
            }

            let Some(dest) = safe_destination(&root, &name) else {
                warn!(entry = %name, "skipping archive entry outside the locales directory");
                continue;
            };

            let mut raw = Vec::new();
            entry
                .read_to_end(&mut raw)
                .map_err(|e| Error::entry(&name, Error::io(&dest, e)))?;
            drop(entry);

            self.write_entry(&raw, &dest)
                .await
                .map_err(|e| Error::entry(&name, e))?;
            debug!(entry = %name, dest = %dest.display(), "wrote translations");
            written.push(dest);
        }

        Ok(written)
    }

    async fn write_entry(&self, raw: &[u8], dest: &Path) -> Result<(), Error> {
        let hooks = &self.settings.hooks;
        let translations = (hooks.translations_loader)(raw)?;
        let text = (hooks.translations_converter)(&translations)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        tokio::fs::write(dest, text)
            .await
            .map_err(|e| Error::io(dest, e))
    }
}
