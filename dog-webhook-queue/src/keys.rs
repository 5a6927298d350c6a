//! Key layout for everything the adapter writes to the KV store.
//!
//! All keys of one queue share the `{name}` hash-tag, so a clustered store
//! routes the queue record and every status entry to the same slot:
//!
//! ```text
//! prefix_store_{orders}                      queue record
//! prefix_store_{orders}_job_READY_<id>       waiting job
//! prefix_store_{orders}_job_ERROR_<id>       dead-letter entry
//! ```
//!
//! Queue names may not contain `{` or `}` (the registry refuses them), so
//! the tag always ends at the name and a queue's matchers never reach into
//! another queue's keys.

use crate::types::JobStatus;

/// `prefix_store_{name}`
pub fn store_key(prefix: &str, name: &str) -> String {
    format!("{prefix}_store_{{{name}}}")
}

/// `prefix_store_{name}_job_STATUS_id`
pub fn job_key(prefix: &str, name: &str, status: JobStatus, id: &str) -> String {
    format!("{}_job_{}_{}", store_key(prefix, name), status.as_str(), id)
}

/// Scan pattern matching every queue record under `prefix`
pub fn queue_matcher(prefix: &str) -> String {
    format!("{}_store_{{*}}", escape_glob(prefix))
}

/// Scan pattern matching the status entries of one queue.
///
/// `None` matches both statuses.
pub fn job_matcher(prefix: &str, name: &str, status: Option<JobStatus>) -> String {
    let base = escape_glob(&store_key(prefix, name));
    match status {
        Some(status) => format!("{base}_job_{}_*", status.as_str()),
        None => format!("{base}_job_*"),
    }
}

/// Escape the characters SCAN MATCH treats as glob syntax
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The cluster hash-tag of a key: the text between the first `{` and the
/// next `}`, or the whole key when there is no non-empty tag.
pub fn hash_tag(key: &str) -> &str {
    if let Some(open) = key.find('{') {
        if let Some(len) = key[open + 1..].find('}') {
            if len > 0 {
                return &key[open + 1..open + 1 + len];
            }
        }
    }
    key
}
