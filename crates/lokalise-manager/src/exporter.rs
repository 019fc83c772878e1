use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use futures::future::join_all;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::backoff::{Backoff, Sleeper};
use crate::client::{ApiClient, ClientFactory};
use crate::config::Settings;
use crate::error::Error;
use crate::remote::{QueuedProcess, RemoteApi, UploadRequest};
use crate::terminal::{StdTerminal, Terminal};

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub full_path: PathBuf,
    /// Path relative to the locales root.
    pub relative_path: PathBuf,
}

/// What happened to one uploaded file.
#[derive(Debug)]
pub enum UploadOutcome {
    Success { process: QueuedProcess, path: PathBuf },
    Failure { path: PathBuf, error: Error },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Success { path, .. } | Self::Failure { path, .. } => path,
        }
    }

    pub fn process(&self) -> Option<&QueuedProcess> {
        match self {
            Self::Success { process, .. } => Some(process),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }
}

/// Uploads local translation files to the remote project.
pub struct Exporter {
    settings: Settings,
    client: ApiClient,
    terminal: Arc<dyn Terminal>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Exporter {
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

    /// Every file under the locales root that should be uploaded, in sorted order.
    pub fn candidates(&self) -> Result<Vec<FileCandidate>, Error> {
        let root = &self.settings.locales_path;
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let walk = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walk {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, e.into())
            })?;

            // Symlinked files count; symlinked directories are not descended.
            if !entry.path().is_file() {
                continue;
            }

            let full_path = entry.into_path();
            if !self.settings.proper_ext(&full_path)
                || (self.settings.hooks.skip_file_export)(&full_path)
            {
                continue;
            }

            let relative_path = full_path
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| full_path.clone());

            candidates.push(FileCandidate {
                full_path,
                relative_path,
            });
        }

        Ok(candidates)
    }

    /// Upload every candidate file.
    ///
    /// Files go out in batches of `max_concurrent_uploads`; a batch is
    /// uploaded concurrently and fully settled before the next one starts.
    /// With `raise_on_export_fail` set, the first failure of a settled batch
    /// aborts the export.
    pub async fn export(&self) -> Result<Vec<UploadOutcome>, Error> {
        self.settings.validate()?;

        let candidates = self.candidates()?;
        let batch_size = self.settings.max_concurrent_uploads.max(1);
        info!(
            files = candidates.len(),
            batch_size, "exporting translation files"
        );

        let mut outcomes = Vec::with_capacity(candidates.len());
        if !candidates.is_empty() {
            let api = self.client.get(&self.settings.client_config())?;
            let backoff = self.backoff();
            let project_ref = self.settings.project_ref();

            for (index, batch) in candidates.chunks(batch_size).enumerate() {
                info!(batch = index + 1, files = batch.len(), "uploading batch");
                let requests = join_all(batch.iter().map(|c| self.build_request(c))).await;
                let settled = join_all(batch.iter().zip(requests).map(|(candidate, request)| {
                    self.upload(api.as_ref(), &backoff, &project_ref, candidate, request)
                }))
                .await;

                for outcome in settled {
                    match outcome {
                        UploadOutcome::Failure { path, error } if self.settings.raise_on_export_fail => {
                            return Err(Error::upload(path, error));
                        }
                        outcome => outcomes.push(outcome),
                    }
                }
            }
        }

        if !self.settings.silent_mode {
            self.terminal.notice("Task complete!");
        }

        Ok(outcomes)
    }

    fn backoff(&self) -> Backoff {
        let backoff = Backoff::new(self.settings.backoff);
        match &self.sleeper {
            Some(sleeper) => backoff.with_sleeper(Arc::clone(sleeper)),
            None => backoff,
        }
    }

    async fn upload(
        &self,
        api: &dyn RemoteApi,
        backoff: &Backoff,
        project_ref: &str,
        candidate: &FileCandidate,
        request: Result<UploadRequest, Error>,
    ) -> UploadOutcome {
        let path = candidate.full_path.clone();

        let request = match request {
            Ok(request) => request,
            Err(error) => return UploadOutcome::Failure { path, error },
        };

        debug!(path = %path.display(), filename = %request.filename, "uploading");
        let result = backoff
            .run(self.settings.max_retries_export, || {
                api.upload_file(project_ref, &request)
            })
            .await;

        match result {
            Ok(process) => UploadOutcome::Success { process, path },
            Err(e) => UploadOutcome::Failure {
                path,
                error: e.into(),
            },
        }
    }

    async fn build_request(&self, candidate: &FileCandidate) -> Result<UploadRequest, Error> {
        let full = &candidate.full_path;
        let hooks = &self.settings.hooks;

        let raw = tokio::fs::read_to_string(full)
            .await
            .map_err(|e| Error::io(full, e))?;

        let processed = (hooks.export_preprocessor)(&raw, full)?;
        let lang_iso = (hooks.lang_iso_inferer)(&raw, full)?;
        let filename = (hooks.export_filename_generator)(full, &candidate.relative_path);

        Ok(UploadRequest {
            data: base64::engine::general_purpose::STANDARD.encode(processed),
            filename,
            lang_iso,
            options: self.settings.export_opts.clone(),
        })
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::config::{Defaults, Overrides};
    use crate::test_support::{FakeFactory, FakeRemote};

    use super::*;

    fn exporter_for(root: &Path, overrides: Overrides) -> Exporter {
        let settings = Settings::build(
            &Defaults::default(),
            overrides
                .set("api_token", "token")
                .set("project_id", "123.abc")
                .set("locales_path", root.to_string_lossy().into_owned()),
        )
        .unwrap();
        let factory = Arc::new(FakeFactory::new(Arc::new(FakeRemote::new())));
        Exporter::new(settings, factory)
    }

    #[test]
    fn candidates_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("ru.yml"), "ru: {}").unwrap();
        fs::write(dir.path().join("en.yaml"), "en: {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        fs::write(dir.path().join("nested/de.YML"), "de: {}").unwrap();
        fs::write(dir.path().join("nested/skip.yml"), "fr: {}").unwrap();

        let exporter = exporter_for(
            dir.path(),
            Overrides::new().skip_file_export(|p| p.ends_with("skip.yml")),
        );
        let relative: Vec<PathBuf> = exporter
            .candidates()
            .unwrap()
            .into_iter()
            .map(|c| c.relative_path)
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("en.yaml"),
                PathBuf::from("nested/de.YML"),
                PathBuf::from("ru.yml"),
            ]
        );
    }

    #[test]
    fn directories_named_like_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder.yml")).unwrap();

        let exporter = exporter_for(dir.path(), Overrides::new());
        assert!(exporter.candidates().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shared.yml");
        fs::write(&target, "en: {}").unwrap();
        let root = dir.path().join("locales");
        fs::create_dir_all(&root).unwrap();
        std::os::unix::fs::symlink(&target, root.join("en.yml")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.yml"), root.join("dangling.yml")).unwrap();

        let exporter = exporter_for(&root, Overrides::new());
        let relative: Vec<PathBuf> = exporter
            .candidates()
            .unwrap()
            .into_iter()
            .map(|c| c.relative_path)
            .collect();

        assert_eq!(relative, vec![PathBuf::from("en.yml")]);
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".backup")).unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join(".backup/en.yml"), "en: {}").unwrap();
        fs::write(dir.path().join(".draft.yml"), "en: {}").unwrap();
        fs::write(dir.path().join("nested/.fr.yml"), "fr: {}").unwrap();
        fs::write(dir.path().join("nested/de.yml"), "de: {}").unwrap();

        let exporter = exporter_for(dir.path(), Overrides::new());
        let relative: Vec<PathBuf> = exporter
            .candidates()
            .unwrap()
            .into_iter()
            .map(|c| c.relative_path)
            .collect();

        assert_eq!(relative, vec![PathBuf::from("nested/de.yml")]);
    }

    #[test]
    fn missing_root_has_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = exporter_for(&dir.path().join("nope"), Overrides::new());
        assert!(exporter.candidates().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_encodes_content_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let content = "en:\n  key: value\n";
        fs::write(dir.path().join("en.yml"), content).unwrap();

        let exporter = exporter_for(
            dir.path(),
            Overrides::new().set("export_opts", serde_json::json!({"convert_placeholders": true})),
        );
        let candidate = exporter.candidates().unwrap().remove(0);
        let request = exporter.build_request(&candidate).await.unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&request.data)
            .unwrap();
        assert_eq!(decoded, content.as_bytes());
        assert_eq!(request.filename, "en.yml");
        assert_eq!(request.lang_iso, "en");
        assert_eq!(request.options["convert_placeholders"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn request_uses_custom_hooks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/main.yml"), "  en:\n    a: b\n\n").unwrap();

        let exporter = exporter_for(
            dir.path(),
            Overrides::new()
                .export_preprocessor(|raw, _| Ok(raw.trim().as_bytes().to_vec()))
                .lang_iso_inferer(|_, _| Ok("en_GB".into()))
                .export_filename_generator(|_, rel| format!("prefix/{}", rel.display())),
        );
        let candidate = exporter.candidates().unwrap().remove(0);
        let request = exporter.build_request(&candidate).await.unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&request.data)
            .unwrap();
        assert_eq!(decoded, b"en:\n    a: b");
        assert_eq!(request.lang_iso, "en_GB");
        assert_eq!(request.filename, "prefix/sub/main.yml");
    }
}
