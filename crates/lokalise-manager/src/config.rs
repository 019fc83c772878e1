use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::backoff::BackoffPolicy;
use crate::client::ClientConfig;
use crate::codec::Translations;
use crate::error::{CodecError, ConfigError};
use crate::hooks::{HOOK_KEYS, HookOverrides, Hooks};
use crate::merge::deep_merge;

/// Backoff timings as they appear in configuration, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffSettings {
    pub base_secs: f64,
    pub cap_secs: f64,
    pub jitter_secs: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_secs: 1.0,
            cap_secs: 32.0,
            jitter_secs: 1.0,
        }
    }
}

impl BackoffSettings {
    fn to_policy(self) -> Result<BackoffPolicy, ConfigError> {
        let secs = |name: &str, value: f64| {
            Duration::try_from_secs_f64(value).map_err(|e| ConfigError::BadValue {
                key: format!("backoff.{name}"),
                message: e.to_string(),
            })
        };
        Ok(BackoffPolicy {
            base: secs("base_secs", self.base_secs)?,
            cap: secs("cap_secs", self.cap_secs)?,
            jitter: secs("jitter_secs", self.jitter_secs)?,
        })
    }
}

/// Default values for every plain (non-hook) setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub api_token: String,
    pub project_id: String,
    pub branch: String,
    pub locales_path: PathBuf,
    pub file_ext_regexp: String,
    pub import_opts: Map<String, Value>,
    pub export_opts: Map<String, Value>,
    pub import_safe_mode: bool,
    pub import_async: bool,
    pub timeouts: Map<String, Value>,
    pub max_retries_export: i64,
    pub max_retries_import: i64,
    pub max_concurrent_uploads: usize,
    pub backoff: BackoffSettings,
    pub use_oauth2_token: bool,
    pub silent_mode: bool,
    pub raise_on_export_fail: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        let import_opts = json!({
            "format": "ruby_yaml",
            "placeholder_format": "icu",
            "yaml_include_root": true,
            "original_filenames": true,
            "directory_prefix": "",
            "indentation": "2sp",
        });

        Self {
            api_token: String::new(),
            project_id: String::new(),
            branch: String::new(),
            locales_path: std::env::current_dir()
                .unwrap_or_default()
                .join("locales"),
            file_ext_regexp: r"(?i)\.ya?ml\z".into(),
            import_opts: match import_opts {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            export_opts: Map::new(),
            import_safe_mode: false,
            import_async: false,
            timeouts: Map::new(),
            max_retries_export: 5,
            max_retries_import: 5,
            max_concurrent_uploads: 6,
            backoff: BackoffSettings::default(),
            use_oauth2_token: false,
            silent_mode: false,
            raise_on_export_fail: true,
        }
    }
}

/// Caller-supplied settings layered over [`Defaults`].
#[derive(Clone, Default)]
pub struct Overrides {
    values: Map<String, Value>,
    hooks: HookOverrides,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            hooks: HookOverrides::default(),
        }
    }

    /// Set one value, replacing whatever was there.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Deep-merge a whole mapping over the values collected so far.
    pub fn merge(&mut self, values: Map<String, Value>) {
        deep_merge(&mut self.values, values);
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn skip_file_export(mut self, hook: impl Fn(&Path) -> bool + Send + Sync + 'static) -> Self {
        self.hooks.skip_file_export = Some(Arc::new(hook));
        self
    }

    pub fn translations_loader(
        mut self,
        hook: impl Fn(&[u8]) -> Result<Translations, CodecError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.translations_loader = Some(Arc::new(hook));
        self
    }

    pub fn translations_converter(
        mut self,
        hook: impl Fn(&Translations) -> Result<String, CodecError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.translations_converter = Some(Arc::new(hook));
        self
    }

    pub fn lang_iso_inferer(
        mut self,
        hook: impl Fn(&str, &Path) -> Result<String, CodecError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.lang_iso_inferer = Some(Arc::new(hook));
        self
    }

    pub fn export_preprocessor(
        mut self,
        hook: impl Fn(&str, &Path) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.export_preprocessor = Some(Arc::new(hook));
        self
    }

    pub fn export_filename_generator(
        mut self,
        hook: impl Fn(&Path, &Path) -> String + Send + Sync + 'static,
    ) -> Self {
        self.hooks.export_filename_generator = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overrides")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// Fully resolved settings for one task. Fields may be changed after
/// construction; they are validated again when the task runs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_token: String,
    pub project_id: String,
    pub branch: String,
    pub locales_path: PathBuf,
    pub file_ext_regexp: Regex,
    pub import_opts: Map<String, Value>,
    pub export_opts: Map<String, Value>,
    pub import_safe_mode: bool,
    pub import_async: bool,
    pub timeouts: Map<String, Value>,
    pub max_retries_export: i64,
    pub max_retries_import: i64,
    pub max_concurrent_uploads: usize,
    pub backoff: BackoffPolicy,
    pub use_oauth2_token: bool,
    pub silent_mode: bool,
    pub raise_on_export_fail: bool,
    pub hooks: Hooks,
}

impl Settings {
    /// Layer `overrides` over `defaults`.
    ///
    /// Nested mappings merge key by key; anything else in `overrides`
    /// replaces the default. Every key not recognized as a setting is
    /// reported at once.
    pub fn build(defaults: &Defaults, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut values = match serde_json::to_value(defaults) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                return Err(ConfigError::BadValue {
                    key: "defaults".into(),
                    message: e.to_string(),
                });
            }
        };

        let mut unknown: Vec<String> = overrides
            .values
            .keys()
            .filter(|key| !values.contains_key(*key) && !HOOK_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(ConfigError::UnknownKeys(unknown));
        }

        if let Some(key) = overrides
            .values
            .keys()
            .find(|key| HOOK_KEYS.contains(&key.as_str()))
        {
            return Err(ConfigError::BadValue {
                key: key.clone(),
                message: "hooks can only be set programmatically".into(),
            });
        }

        deep_merge(&mut values, overrides.values);
        let resolved: Defaults =
            serde_json::from_value(Value::Object(values)).map_err(|e| ConfigError::BadValue {
                key: "settings".into(),
                message: e.to_string(),
            })?;

        let file_ext_regexp =
            Regex::new(&resolved.file_ext_regexp).map_err(|e| ConfigError::BadValue {
                key: "file_ext_regexp".into(),
                message: e.to_string(),
            })?;

        if resolved.max_concurrent_uploads == 0 {
            return Err(ConfigError::BadValue {
                key: "max_concurrent_uploads".into(),
                message: "must be at least 1".into(),
            });
        }

        let mut hooks = Hooks::default();
        overrides.hooks.apply(&mut hooks);

        Ok(Self {
            api_token: resolved.api_token,
            project_id: resolved.project_id,
            branch: resolved.branch,
            locales_path: resolved.locales_path,
            file_ext_regexp,
            import_opts: resolved.import_opts,
            export_opts: resolved.export_opts,
            import_safe_mode: resolved.import_safe_mode,
            import_async: resolved.import_async,
            timeouts: resolved.timeouts,
            max_retries_export: resolved.max_retries_export,
            max_retries_import: resolved.max_retries_import,
            max_concurrent_uploads: resolved.max_concurrent_uploads,
            backoff: resolved.backoff.to_policy()?,
            use_oauth2_token: resolved.use_oauth2_token,
            silent_mode: resolved.silent_mode,
            raise_on_export_fail: resolved.raise_on_export_fail,
            hooks,
        })
    }

    /// Check the settings every task needs, reporting all problems together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.project_id.trim().is_empty() {
            errors.push("Project ID is not set!".to_owned());
        }
        if self.api_token.trim().is_empty() {
            errors.push("Lokalise API token is not set!".to_owned());
        }
        if self.max_concurrent_uploads == 0 {
            errors.push("Concurrency limit must be at least 1!".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// The project identifier, suffixed with `:<branch>` when a branch is set.
    pub fn project_ref(&self) -> String {
        let branch = self.branch.trim();
        if branch.is_empty() {
            self.project_id.clone()
        } else {
            format!("{}:{}", self.project_id, branch)
        }
    }

    /// Whether the extension of `path` (leading dot included) matches the filter.
    pub fn proper_ext(&self, path: impl AsRef<Path>) -> bool {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.file_ext_regexp.is_match(&ext)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            token: self.api_token.clone(),
            oauth2: self.use_oauth2_token,
            options: self.timeouts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: Overrides) -> Result<Settings, ConfigError> {
        Settings::build(&Defaults::default(), overrides)
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let settings = build(Overrides::new()).unwrap();
        let defaults = Defaults::default();

        assert_eq!(settings.api_token, "");
        assert_eq!(settings.locales_path, defaults.locales_path);
        assert_eq!(settings.max_retries_export, 5);
        assert_eq!(settings.max_retries_import, 5);
        assert_eq!(settings.max_concurrent_uploads, 6);
        assert!(settings.raise_on_export_fail);
        assert!(!settings.import_safe_mode);
        assert!(!settings.silent_mode);
        assert_eq!(settings.import_opts["format"], json!("ruby_yaml"));
        assert_eq!(settings.backoff, BackoffPolicy::default());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let settings = build(
            Overrides::new()
                .set("api_token", "secret")
                .set("project_id", "123.abc")
                .set("max_retries_export", 2)
                .set("silent_mode", true)
                .set("locales_path", "/tmp/locales"),
        )
        .unwrap();

        assert_eq!(settings.api_token, "secret");
        assert_eq!(settings.project_id, "123.abc");
        assert_eq!(settings.max_retries_export, 2);
        assert!(settings.silent_mode);
        assert_eq!(settings.locales_path, PathBuf::from("/tmp/locales"));
        assert_eq!(settings.max_retries_import, 5);
    }

    #[test]
    fn nested_options_merge_recursively() {
        let settings = build(
            Overrides::new().set("import_opts", json!({"format": "json", "indentation": "4sp"})),
        )
        .unwrap();

        assert_eq!(settings.import_opts["format"], json!("json"));
        assert_eq!(settings.import_opts["indentation"], json!("4sp"));
        assert_eq!(settings.import_opts["placeholder_format"], json!("icu"));
        assert_eq!(settings.import_opts["original_filenames"], json!(true));
    }

    #[test]
    fn partial_backoff_override_keeps_other_timings() {
        let settings =
            build(Overrides::new().set("backoff", json!({"jitter_secs": 0.0}))).unwrap();
        assert_eq!(settings.backoff.jitter, Duration::ZERO);
        assert_eq!(settings.backoff.base, Duration::from_secs(1));
        assert_eq!(settings.backoff.cap, Duration::from_secs(32));
    }

    #[test]
    fn misspelled_backoff_key_is_rejected() {
        let err = build(Overrides::new().set("backoff", json!({"base": 5}))).unwrap_err();

        match err {
            ConfigError::BadValue { message, .. } => assert!(message.contains("base")),
            other => panic!("expected bad value, got {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_all_reported() {
        let err = build(
            Overrides::new()
                .set("project_id", "1")
                .set("zeta_option", 1)
                .set("alpha_option", true),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::UnknownKeys(vec!["alpha_option".into(), "zeta_option".into()])
        );
        let message = err.to_string();
        assert!(message.contains("alpha_option"));
        assert!(message.contains("zeta_option"));
    }

    #[test]
    fn hook_keys_cannot_be_plain_values() {
        let err = build(Overrides::new().set("skip_file_export", true)).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { key, .. } if key == "skip_file_export"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = build(Overrides::new().set("max_retries_export", "lots")).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { .. }));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = build(Overrides::new().set("file_ext_regexp", "(")).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { key, .. } if key == "file_ext_regexp"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = build(Overrides::new().set("max_concurrent_uploads", 0)).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { key, .. } if key == "max_concurrent_uploads"));
    }

    #[test]
    fn hook_overrides_are_applied() {
        let settings = build(Overrides::new().skip_file_export(|p| p.ends_with("skip.yml"))).unwrap();
        assert!((settings.hooks.skip_file_export)(Path::new("locales/skip.yml")));
        assert!(!(settings.hooks.skip_file_export)(Path::new("locales/en.yml")));
    }

    #[test]
    fn validate_reports_every_missing_field() {
        let settings = build(Overrides::new()).unwrap();
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid(vec![
                "Project ID is not set!".into(),
                "Lokalise API token is not set!".into(),
            ])
        );
    }

    #[test]
    fn validate_sees_later_mutation() {
        let mut settings = build(Overrides::new().set("project_id", "1")).unwrap();
        assert!(settings.validate().is_err());

        settings.api_token = "secret".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn project_ref_appends_branch() {
        let mut settings = build(Overrides::new().set("project_id", "123.abc")).unwrap();
        assert_eq!(settings.project_ref(), "123.abc");

        settings.branch = "  ".into();
        assert_eq!(settings.project_ref(), "123.abc");

        settings.branch = "develop".into();
        assert_eq!(settings.project_ref(), "123.abc:develop");
    }

    #[test]
    fn extension_filter_matches_yaml_case_insensitively() {
        let settings = build(Overrides::new()).unwrap();
        assert!(settings.proper_ext("locales/en.yml"));
        assert!(settings.proper_ext("locales/en.YAML"));
        assert!(!settings.proper_ext("locales/en.json"));
        assert!(!settings.proper_ext("locales/README"));
        assert!(!settings.proper_ext("locales/en.yml.bak"));
    }

    #[test]
    fn client_config_carries_auth_and_timeouts() {
        let settings = build(
            Overrides::new()
                .set("api_token", "t")
                .set("use_oauth2_token", true)
                .set("timeouts", json!({"open_timeout": 5})),
        )
        .unwrap();

        let config = settings.client_config();
        assert_eq!(config.token, "t");
        assert!(config.oauth2);
        assert_eq!(config.options["open_timeout"], json!(5));
    }

    #[test]
    fn merged_overrides_layer_in_order() {
        let mut overrides = Overrides::new();
        overrides.merge(match json!({"export_opts": {"a": 1, "b": 1}}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        });
        overrides.merge(match json!({"export_opts": {"b": 2}}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        });

        let settings = build(overrides).unwrap();
        assert_eq!(Value::Object(settings.export_opts), json!({"a": 1, "b": 2}));
    }
}
