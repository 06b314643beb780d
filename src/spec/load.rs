//! Spec document loading and asset path resolution.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::foundation::error::{CardforgeError, CardforgeResult};

/// Load a spec document into a raw value tree.
///
/// Dispatches on the file extension: `.json` parses as JSON, anything else
/// as YAML. Mapping order is preserved either way, which keeps filter
/// pipelines in document order.
pub fn load_document(path: &Path) -> CardforgeResult<Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CardforgeError::serde(format!("reading {}: {e}", path.display())))?;
    let as_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    parse_document(&raw, as_json)
        .map_err(|e| CardforgeError::serde(format!("parsing {}: {e}", path.display())))
}

fn parse_document(raw: &str, as_json: bool) -> Result<Value, String> {
    if as_json {
        serde_json::from_str(raw).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(raw).map_err(|e| e.to_string())
    }
}

/// Resolve an asset reference against the spec document's directory.
///
/// Relative paths prefer the spec-directory join when that file exists;
/// otherwise the path is returned as written, relative to the working
/// directory.
pub fn resolve_asset_path(path: &str, base: Option<&Path>) -> PathBuf {
    let raw = PathBuf::from(path);
    if raw.is_absolute() {
        return raw;
    }
    if let Some(base) = base {
        let joined = base.join(&raw);
        if joined.exists() {
            return joined;
        }
    }
    raw
}
