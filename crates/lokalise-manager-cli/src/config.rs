use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Which task a configuration is being loaded for. Selects the
/// `[export]` or `[import]` table of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Export,
    Import,
}

impl Task {
    fn table(self) -> &'static str {
        match self {
            Task::Export => "export",
            Task::Import => "import",
        }
    }
}

/// File looked up in the working directory before the user config dir.
pub const LOCAL_CONFIG: &str = "lokalise.toml";

/// User config path: `~/.config/lokalise-manager/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lokalise-manager").join("config.toml"))
}

/// The config file to use. An explicit path always wins, even if missing,
/// so that a typo surfaces as an error instead of silently using defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.is_file() {
        return Some(local);
    }

    user_config_path().filter(|p| p.is_file())
}

/// Load the settings for `task` from a TOML file. Top-level keys apply to
/// both tasks; the task's own table is deep-merged over them.
pub fn load_file(path: &Path, task: Task) -> Result<Map<String, Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse(&contents, task).with_context(|| format!("invalid config file: {}", path.display()))
}

fn parse(contents: &str, task: Task) -> Result<Map<String, Value>> {
    let table: toml::Table = toml::from_str(contents)?;
    let Value::Object(mut values) = serde_json::to_value(table)? else {
        anyhow::bail!("expected a table at the top level");
    };

    let export = values.remove(Task::Export.table());
    let import = values.remove(Task::Import.table());
    let task_values = match task {
        Task::Export => export,
        Task::Import => import,
    };

    match task_values {
        None => {}
        Some(Value::Object(task_values)) => lokalise_manager::merge::deep_merge(&mut values, task_values),
        Some(_) => anyhow::bail!("`{}` must be a table", task.table()),
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn task_table_is_merged_over_shared_keys() {
        let values = parse(
            r#"
                project_id = "123.abc"
                locales_path = "config/locales"

                [import_opts]
                format = "ruby_yaml"
                indentation = "2sp"

                [import]
                import_async = true

                [import.import_opts]
                indentation = "4sp"

                [export]
                max_concurrent_uploads = 2
            "#,
            Task::Import,
        )
        .unwrap();

        assert_eq!(values["project_id"], json!("123.abc"));
        assert_eq!(values["import_async"], json!(true));
        assert_eq!(
            values["import_opts"],
            json!({"format": "ruby_yaml", "indentation": "4sp"})
        );
        assert!(!values.contains_key("max_concurrent_uploads"));
        assert!(!values.contains_key("export"));
        assert!(!values.contains_key("import"));
    }

    #[test]
    fn export_table_applies_only_to_export() {
        let values = parse(
            "branch = \"main\"\n[export]\nraise_on_export_fail = false\n",
            Task::Export,
        )
        .unwrap();

        assert_eq!(values["branch"], json!("main"));
        assert_eq!(values["raise_on_export_fail"], json!(false));
    }

    #[test]
    fn task_key_must_be_a_table() {
        let err = parse("import = 3\n", Task::Import).unwrap_err();
        assert!(err.to_string().contains("`import` must be a table"));
    }

    #[test]
    fn load_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lokalise.toml");
        std::fs::write(&path, "project_id = \n").unwrap();

        let err = load_file(&path, Task::Export).unwrap_err();
        assert!(err.to_string().contains("lokalise.toml"));
    }

    #[test]
    fn explicit_path_wins_even_when_missing() {
        let path = Path::new("/nonexistent/lokalise.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
