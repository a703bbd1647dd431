//! Pending background tasks.
//!
//! A [`PendingTask`] exists while a long-running operation (typically an AI
//! analysis) is in flight. The registry that owns them lives in
//! `shoin-client`; this module only defines the record and the summary line
//! shown to the user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A keyed, named background operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTask {
    /// Unique key (often the AI task correlation id).
    pub key: String,
    /// What the user sees, e.g. a file name.
    pub display_name: String,
}

impl PendingTask {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
        }
    }

    /// Create a task with a fresh time-ordered key.
    pub fn with_generated_key(display_name: impl Into<String>) -> Self {
        Self::new(Uuid::now_v7().to_string(), display_name)
    }
}

/// Summarize pending tasks for a status line.
///
/// `display_names` must iterate in a stable order; the first item is the one
/// named. Returns `None` when there is nothing pending.
///
/// - one task: `"Analyzing doc.pdf"`
/// - n tasks: `"Analyzing doc.pdf (+{n-1})"`
pub fn summarize<'a, I>(display_names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names = display_names.into_iter();
    let first = names.next()?;
    let rest = names.count();
    if rest == 0 {
        Some(format!("Analyzing {first}"))
    } else {
        Some(format!("Analyzing {first} (+{rest})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(std::iter::empty()), None);
        assert_eq!(summarize(["doc.pdf"]), Some("Analyzing doc.pdf".into()));
        assert_eq!(
            summarize(["doc.pdf", "notes.md"]),
            Some("Analyzing doc.pdf (+1)".into())
        );
        assert_eq!(
            summarize(["a", "b", "c", "d"]),
            Some("Analyzing a (+3)".into())
        );
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = PendingTask::with_generated_key("a");
        let b = PendingTask::with_generated_key("a");
        assert_ne!(a.key, b.key);
        assert_eq!(a.display_name, "a");
    }

    #[test]
    fn test_serde_camel_case() {
        let task = PendingTask::new("k1", "doc.pdf");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json, serde_json::json!({"key": "k1", "displayName": "doc.pdf"}));
    }
}
