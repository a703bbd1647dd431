//! Block-level lock model.
//!
//! A [`LockState`] is advisory: it tells the rendering layer who currently
//! holds editing rights over a document region. Actual conflict prevention
//! happens wherever writes are issued. The classification here must still be
//! total, so every variant has a label and unknown variants are rejected at
//! the deserialization boundary instead of being defaulted.
//!
//! ## Wire shape
//!
//! ```json
//! { "kind": "none" }
//! { "kind": "coded" }
//! { "kind": "user", "userId": "abc" }
//! { "kind": "ai", "taskId": "task-42" }
//! ```
//!
//! Absent, `null`, `""` and `{}` all mean [`LockState::Unlocked`]. Most
//! regions carry no lock at all, so absence is the common case.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Errors from parsing a lock representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Lock object without a `kind` discriminant.
    #[error("lock object has no \"kind\" field")]
    MissingKind,

    /// The `kind` discriminant is not one we know. Client and server
    /// disagree on the lock schema.
    #[error("unknown lock variant: {0:?}")]
    UnknownVariant(String),

    /// A known variant is missing its payload field.
    #[error("{kind} lock is missing field {field:?}")]
    MissingField { kind: LockKind, field: &'static str },

    /// Not an object, or a field has the wrong type.
    #[error("malformed lock: {0}")]
    Malformed(String),
}

/// Discriminant of a [`LockState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum LockKind {
    None,
    Coded,
    User,
    Ai,
}

/// Who currently holds editing rights over a document region.
///
/// `Coded` and the `User`/`Ai` locks are mutually exclusive: a coded region
/// never becomes user- or AI-editable. The transition itself is policed by
/// the consumer, but the predicates below reflect it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LockState {
    /// Nobody holds the region.
    #[default]
    Unlocked,
    /// Permanently locked by a prior classification.
    Coded,
    /// Held by a specific human.
    User { user_id: String },
    /// Held by a running AI operation.
    Ai { task_id: String },
}

impl LockState {
    /// Create a user lock.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User {
            user_id: user_id.into(),
        }
    }

    /// Create an AI lock.
    pub fn ai(task_id: impl Into<String>) -> Self {
        Self::Ai {
            task_id: task_id.into(),
        }
    }

    pub fn kind(&self) -> LockKind {
        match self {
            LockState::Unlocked => LockKind::None,
            LockState::Coded => LockKind::Coded,
            LockState::User { .. } => LockKind::User,
            LockState::Ai { .. } => LockKind::Ai,
        }
    }

    /// Anything other than [`LockState::Unlocked`].
    pub fn is_locked(&self) -> bool {
        !matches!(self, LockState::Unlocked)
    }

    pub fn is_coded(&self) -> bool {
        matches!(self, LockState::Coded)
    }

    pub fn is_user_lock(&self) -> bool {
        matches!(self, LockState::User { .. })
    }

    pub fn is_ai_lock(&self) -> bool {
        matches!(self, LockState::Ai { .. })
    }

    /// The holding user, if this is a user lock.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            LockState::User { user_id } => Some(user_id),
            _ => None,
        }
    }

    /// The holding task, if this is an AI lock.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            LockState::Ai { task_id } => Some(task_id),
            _ => None,
        }
    }

    /// Short human-readable label for the rendering layer.
    pub fn label(&self) -> String {
        match self {
            LockState::Unlocked => String::new(),
            LockState::Coded => "Coded".to_string(),
            LockState::User { user_id } => format!("Editing: {user_id}"),
            LockState::Ai { .. } => "AI Processing".to_string(),
        }
    }

    /// Parse a lock from its JSON representation.
    ///
    /// `None`, `null`, `""` and `{}` yield [`LockState::Unlocked`].
    pub fn from_value(value: Option<&Value>) -> Result<Self, LockError> {
        let map = match value {
            None | Some(Value::Null) => return Ok(LockState::Unlocked),
            Some(Value::String(s)) if s.is_empty() => return Ok(LockState::Unlocked),
            Some(Value::Object(map)) if map.is_empty() => return Ok(LockState::Unlocked),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(LockError::Malformed(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        let kind = match map.get("kind") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => {
                return Err(LockError::Malformed(format!(
                    "\"kind\" must be a string, got {other}"
                )));
            }
            None => return Err(LockError::MissingKind),
        };
        let kind: LockKind = kind
            .parse()
            .map_err(|_| LockError::UnknownVariant(kind.to_string()))?;

        let field = |name: &'static str| -> Result<String, LockError> {
            match map.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(LockError::Malformed(format!(
                    "{name:?} must be a string, got {other}"
                ))),
                None => Err(LockError::MissingField { kind, field: name }),
            }
        };

        Ok(match kind {
            LockKind::None => LockState::Unlocked,
            LockKind::Coded => LockState::Coded,
            LockKind::User => LockState::User {
                user_id: field("userId")?,
            },
            LockKind::Ai => LockState::Ai {
                task_id: field("taskId")?,
            },
        })
    }

    /// Parse a lock from a JSON string. Blank input is [`LockState::Unlocked`].
    pub fn from_json_str(s: &str) -> Result<Self, LockError> {
        if s.trim().is_empty() {
            return Ok(LockState::Unlocked);
        }
        let value: Value =
            serde_json::from_str(s).map_err(|e| LockError::Malformed(e.to_string()))?;
        Self::from_value(Some(&value))
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for LockState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if matches!(self, LockState::User { .. } | LockState::Ai { .. }) {
            2
        } else {
            1
        };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("kind", self.kind().as_ref())?;
        match self {
            LockState::User { user_id } => map.serialize_entry("userId", user_id)?,
            LockState::Ai { task_id } => map.serialize_entry("taskId", task_id)?,
            LockState::Unlocked | LockState::Coded => {}
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LockState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        LockState::from_value(value.as_ref()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_labels() {
        assert_eq!(LockState::Unlocked.label(), "");
        assert_eq!(LockState::Coded.label(), "Coded");
        assert_eq!(LockState::user("abc").label(), "Editing: abc");
        assert_eq!(LockState::ai("t1").label(), "AI Processing");
    }

    #[test]
    fn test_predicates() {
        let user = LockState::user("abc");
        assert!(user.is_locked());
        assert!(user.is_user_lock());
        assert!(!user.is_ai_lock());
        assert!(!user.is_coded());
        assert_eq!(user.user_id(), Some("abc"));
        assert_eq!(user.task_id(), None);

        let ai = LockState::ai("task-9");
        assert!(ai.is_ai_lock());
        assert_eq!(ai.task_id(), Some("task-9"));

        assert!(LockState::Coded.is_locked());
        assert!(LockState::Coded.is_coded());
        assert!(!LockState::Unlocked.is_locked());
    }

    #[test]
    fn test_absent_lock_is_unlocked() {
        assert_eq!(LockState::from_value(None).unwrap(), LockState::Unlocked);
        assert_eq!(LockState::from_value(Some(&Value::Null)).unwrap(), LockState::Unlocked);
        assert_eq!(LockState::from_value(Some(&json!(""))).unwrap(), LockState::Unlocked);
        assert_eq!(LockState::from_value(Some(&json!({}))).unwrap(), LockState::Unlocked);
        assert_eq!(LockState::from_json_str("  ").unwrap(), LockState::Unlocked);
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            LockState::from_value(Some(&json!({"kind": "none"}))).unwrap(),
            LockState::Unlocked
        );
        assert_eq!(
            LockState::from_value(Some(&json!({"kind": "coded"}))).unwrap(),
            LockState::Coded
        );
        assert_eq!(
            LockState::from_json_str(r#"{"kind":"user","userId":"abc"}"#).unwrap(),
            LockState::user("abc")
        );
        assert_eq!(
            LockState::from_value(Some(&json!({"kind": "ai", "taskId": "t"}))).unwrap(),
            LockState::ai("t")
        );
    }

    #[test]
    fn test_unknown_variant_is_loud() {
        let err = LockState::from_value(Some(&json!({"kind": "robot"}))).unwrap_err();
        assert_eq!(err, LockError::UnknownVariant("robot".into()));

        let err = serde_json::from_value::<LockState>(json!({"kind": "robot"})).unwrap_err();
        assert!(err.to_string().contains("robot"));
    }

    #[test]
    fn test_missing_payload() {
        let err = LockState::from_value(Some(&json!({"kind": "user"}))).unwrap_err();
        assert_eq!(
            err,
            LockError::MissingField {
                kind: LockKind::User,
                field: "userId"
            }
        );
        assert_eq!(
            LockState::from_value(Some(&json!({"userId": "x"}))).unwrap_err(),
            LockError::MissingKind
        );
        assert!(matches!(
            LockState::from_value(Some(&json!(42))),
            Err(LockError::Malformed(_))
        ));
    }

    #[test]
    fn test_serde_shape() {
        assert_eq!(
            serde_json::to_value(LockState::user("abc")).unwrap(),
            json!({"kind": "user", "userId": "abc"})
        );
        assert_eq!(
            serde_json::to_value(LockState::Unlocked).unwrap(),
            json!({"kind": "none"})
        );

        #[derive(Deserialize)]
        struct Region {
            #[serde(default)]
            lock: LockState,
        }
        let region: Region = serde_json::from_value(json!({})).unwrap();
        assert_eq!(region.lock, LockState::Unlocked);
        let region: Region = serde_json::from_value(json!({"lock": null})).unwrap();
        assert_eq!(region.lock, LockState::Unlocked);
        let region: Region =
            serde_json::from_value(json!({"lock": {"kind": "ai", "taskId": "t"}})).unwrap();
        assert_eq!(region.lock, LockState::ai("t"));
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(LockKind::Ai.to_string(), "ai");
        assert_eq!("coded".parse::<LockKind>().unwrap(), LockKind::Coded);
        assert_eq!(LockState::user("u").kind(), LockKind::User);
    }
}
