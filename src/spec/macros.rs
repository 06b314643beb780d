//! `%column%` macro substitution over raw spec documents.
//!
//! Resolution is a pure, structure-preserving transform: the pristine parsed
//! spec stays untouched and every row gets a freshly built tree.

use serde_json::Value;

use crate::data::DataRow;

/// Substitute every `%column%` macro in `spec` with values from `row`.
///
/// A string that consists of exactly one macro (after trimming whitespace)
/// takes the row's raw typed value, so numbers survive into numeric fields.
/// Otherwise every macro occurrence is replaced textually, walking columns
/// in header order.
pub fn resolve(spec: &Value, row: &DataRow) -> Value {
    match spec {
        Value::String(s) => resolve_string(s, row),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, row)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, row)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_string(s: &str, row: &DataRow) -> Value {
    let stripped = s.trim();
    for (name, cell) in row.columns() {
        if stripped == format!("%{name}%") {
            return cell.to_value();
        }
    }

    let mut out = s.to_string();
    for (name, cell) in row.columns() {
        let token = format!("%{name}%");
        if out.contains(&token) {
            out = out.replace(&token, &cell.to_text());
        }
    }
    Value::String(out)
}
