//! Default YAML implementations of the translation hooks.

use std::path::Path;

use serde_yaml_ng::Value;

use crate::error::CodecError;

/// A parsed translation file: a mapping keyed by language code at the top level.
pub type Translations = Value;

/// Parse raw archive-entry bytes as YAML.
pub fn load_yaml(raw: &[u8]) -> Result<Translations, CodecError> {
    serde_yaml_ng::from_slice(raw).map_err(|e| CodecError::Parse(e.to_string()))
}

/// Dump translations back to YAML.
///
/// The emitter double-escapes newlines inside quoted scalars; those are
/// folded back to a single `\n` escape.
pub fn dump_yaml(translations: &Translations) -> Result<String, CodecError> {
    let dumped =
        serde_yaml_ng::to_string(translations).map_err(|e| CodecError::Serialize(e.to_string()))?;
    Ok(dumped.replace("\\\\n", "\\n"))
}

/// The language of a YAML translation file is its first top-level key.
pub fn infer_lang_iso(raw: &str, path: &Path) -> Result<String, CodecError> {
    let document: Value =
        serde_yaml_ng::from_str(raw).map_err(|e| CodecError::Parse(e.to_string()))?;

    let first_key = document
        .as_mapping()
        .and_then(|mapping| mapping.keys().next())
        .ok_or_else(|| {
            CodecError::Language(format!("{} has no top-level language key", path.display()))
        })?;

    match first_key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(CodecError::Language(format!(
            "{} has a non-scalar top-level key",
            path.display()
        ))),
    }
}
