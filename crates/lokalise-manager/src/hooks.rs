use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::codec::{self, Translations};
use crate::error::CodecError;

/// Returns true when a candidate file must be left out of the export.
pub type SkipFileExport = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Parses the bytes of one archive entry into a language-keyed mapping.
pub type TranslationsLoader =
    Arc<dyn Fn(&[u8]) -> Result<Translations, CodecError> + Send + Sync>;

/// Serializes a mapping back to its on-disk text.
pub type TranslationsConverter =
    Arc<dyn Fn(&Translations) -> Result<String, CodecError> + Send + Sync>;

/// Derives the language code sent with an upload from the file content and path.
pub type LangIsoInferer = Arc<dyn Fn(&str, &Path) -> Result<String, CodecError> + Send + Sync>;

/// Transforms file content before it is Base64-encoded for upload.
pub type ExportPreprocessor =
    Arc<dyn Fn(&str, &Path) -> Result<Vec<u8>, CodecError> + Send + Sync>;

/// Computes the filename reported to the remote service from the full and relative paths.
pub type ExportFilenameGenerator = Arc<dyn Fn(&Path, &Path) -> String + Send + Sync>;

/// Setting keys that hold hooks rather than plain values.
pub const HOOK_KEYS: [&str; 6] = [
    "skip_file_export",
    "translations_loader",
    "translations_converter",
    "lang_iso_inferer",
    "export_preprocessor",
    "export_filename_generator",
];

/// The pluggable behaviour of a task.
#[derive(Clone)]
pub struct Hooks {
    pub skip_file_export: SkipFileExport,
    pub translations_loader: TranslationsLoader,
    pub translations_converter: TranslationsConverter,
    pub lang_iso_inferer: LangIsoInferer,
    pub export_preprocessor: ExportPreprocessor,
    pub export_filename_generator: ExportFilenameGenerator,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            skip_file_export: Arc::new(|_: &Path| false),
            translations_loader: Arc::new(codec::load_yaml),
            translations_converter: Arc::new(codec::dump_yaml),
            lang_iso_inferer: Arc::new(codec::infer_lang_iso),
            export_preprocessor: Arc::new(|raw: &str, _: &Path| Ok(raw.as_bytes().to_vec())),
            export_filename_generator: Arc::new(|_: &Path, relative: &Path| slash_path(relative)),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// Hooks supplied by the caller; `None` keeps the default.
#[derive(Clone, Default)]
pub struct HookOverrides {
    pub skip_file_export: Option<SkipFileExport>,
    pub translations_loader: Option<TranslationsLoader>,
    pub translations_converter: Option<TranslationsConverter>,
    pub lang_iso_inferer: Option<LangIsoInferer>,
    pub export_preprocessor: Option<ExportPreprocessor>,
    pub export_filename_generator: Option<ExportFilenameGenerator>,
}

impl HookOverrides {
    pub(crate) fn apply(self, hooks: &mut Hooks) {
        if let Some(h) = self.skip_file_export {
            hooks.skip_file_export = h;
        }
        if let Some(h) = self.translations_loader {
            hooks.translations_loader = h;
        }
        if let Some(h) = self.translations_converter {
            hooks.translations_converter = h;
        }
        if let Some(h) = self.lang_iso_inferer {
            hooks.lang_iso_inferer = h;
        }
        if let Some(h) = self.export_preprocessor {
            hooks.export_preprocessor = h;
        }
        if let Some(h) = self.export_filename_generator {
            hooks.export_filename_generator = h;
        }
    }
}

/// Render a relative path with `/` separators regardless of platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
