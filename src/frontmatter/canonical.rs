//! Canonical field ordering for frontmatter.

use serde_yaml::{Mapping, Value};

/// Key holding the work package id; always written first.
pub const ID_FIELD: &str = "work_package_id";

/// Key holding the transition log; always written last.
pub const HISTORY_FIELD: &str = "history";

/// Known fields in the order they are written.
pub const KNOWN_FIELDS: [&str; 10] = [
    ID_FIELD,
    "title",
    "lane",
    "phase",
    "priority",
    "assignee",
    "agent",
    "shell_pid",
    "review_status",
    "reviewed_by",
];

/// True for keys with a fixed slot in the canonical order.
pub fn is_reserved(key: &Value) -> bool {
    key.as_str().is_some_and(|k| k == HISTORY_FIELD || KNOWN_FIELDS.contains(&k))
}

/// Reorder `metadata`: known fields, then custom fields in their original
/// relative order, then `history`.
pub fn canonicalize(metadata: &Mapping) -> Mapping {
    let mut out = Mapping::with_capacity(metadata.len());

    for key in KNOWN_FIELDS {
        if let Some(value) = metadata.get(key) {
            out.insert(Value::from(key), value.clone());
        }
    }

    for (key, value) in metadata {
        if !is_reserved(key) {
            out.insert(key.clone(), value.clone());
        }
    }

    if let Some(history) = metadata.get(HISTORY_FIELD) {
        out.insert(Value::from(HISTORY_FIELD), history.clone());
    }

    out
}
