use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Address, ObjectId};

/// Module name the contract's entry points are qualified under.
pub const CONTRACT_MODULE: &str = "contract";

pub const METHOD_CREATE: &str = "create";
pub const METHOD_ADD_BOOKMARK: &str = "add_bookmark";
pub const METHOD_REMOVE_BOOKMARK: &str = "remove_bookmark";

/// Content kind a payload must declare to be treated as a bookmark record.
pub const RECORD_CONTENT_KIND: &str = "record";

pub fn call_target(package_id: &str, method: &str) -> String {
    format!("{package_id}::{CONTRACT_MODULE}::{method}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableCall {
    pub target: String,
    pub arguments: Vec<CallArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum CallArg {
    Object(ObjectId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEnvelope {
    pub object_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ObjectContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectContent {
    pub kind: String,
    #[serde(default)]
    pub fields: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub bookmark_count: u64,
    pub owner: Address,
}

/// Parse the record fields out of an object payload.
///
/// Anything that is not a well-formed record yields `None` — an
/// unrecognized content kind, a missing field set, an owner that is absent
/// or empty, or a `bookmark_count` that is neither a non-negative integer
/// nor a string encoding one. A malformed record is treated as absent, not
/// as a zeroed default.
pub fn parse_record(envelope: &ObjectEnvelope) -> Option<BookmarkRecord> {
    let content = envelope.content.as_ref()?;
    if content.kind != RECORD_CONTENT_KIND {
        return None;
    }
    let fields = content.fields.as_object()?;

    let bookmark_count = match fields.get("bookmark_count")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse::<u64>().ok()?,
        _ => return None,
    };

    let owner = match fields.get("owner")? {
        Value::String(s) if !s.is_empty() => Address(s.clone()),
        _ => return None,
    };

    Some(BookmarkRecord {
        bookmark_count,
        owner,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub created: Vec<CreatedObject>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEffects {
    pub fn created_object_id(&self) -> Option<&ObjectId> {
        self.created
            .first()
            .map(|created| &created.reference.object_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedObject {
    pub reference: OwnedObjectRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedObjectRef {
    pub object_id: ObjectId,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
