use serde::{Deserialize, Serialize};
use serde_json::Value;


pub const ROOM_PREFIX: &str = "room::";
pub const DRAWING_PREFIX: &str = "drawing::";
pub const PRESENCE_PREFIX: &str = "presence::";
pub const PREVIEW_PREFIX: &str = "preview::";
pub const AVATAR_PREFIX: &str = "avatar::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub value: Option<AllDocsValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsValue {
    pub rev: String,
}

/// Body returned by successful `PUT` requests.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

/// Any stored body wrapped with CouchDB's `_id`/`_rev` bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, rev: Option<String>, body: T) -> Self {
        Self { id, rev, body }
    }
}

/// Tombstone posted to `_bulk_docs` when purging a room's dependents.
#[derive(Debug, Serialize)]
pub struct DeletedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<DeletedDocument>,
}

pub fn room_doc_id(code: &str) -> String {
    format!("{ROOM_PREFIX}{code}")
}

/// Document id of a drawing, from its [`DrawingEntity::key`](crate::dao::models::DrawingEntity::key).
pub fn drawing_doc_id(drawing_key: &str) -> String {
    format!("{DRAWING_PREFIX}{drawing_key}")
}

/// Prefix shared by every drawing of `code`, or of one of its rounds.
pub fn drawing_prefix(code: &str, round_number: Option<u32>) -> String {
    match round_number {
        Some(round) => format!("{DRAWING_PREFIX}{code}:{round}:"),
        None => format!("{DRAWING_PREFIX}{code}:"),
    }
}

pub fn presence_doc_id(code: &str, player_id: &str) -> String {
    format!("{PRESENCE_PREFIX}{code}:{player_id}")
}

pub fn presence_prefix(code: &str) -> String {
    format!("{PRESENCE_PREFIX}{code}:")
}

pub fn preview_doc_id(code: &str) -> String {
    format!("{PREVIEW_PREFIX}{code}")
}

pub fn avatar_doc_id(player_id: &str) -> String {
    format!("{AVATAR_PREFIX}{player_id}")
}

/// Room code encoded in a room document id.
pub fn room_code_from_doc_id(doc_id: &str) -> Option<&str> {
    doc_id.strip_prefix(ROOM_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::drawing_key;

    #[test]
    fn round_prefix_does_not_match_later_rounds() {
        let prefix = drawing_prefix("ABCDEF", Some(1));
        let first = drawing_doc_id(&drawing_key("ABCDEF", 1, "a", "00ff"));
        let tenth = drawing_doc_id(&drawing_key("ABCDEF", 10, "a", "00ff"));
        assert!(first.starts_with(&prefix));
        assert!(!tenth.starts_with(&prefix));
        assert!(tenth.starts_with(&drawing_prefix("ABCDEF", None)));
    }

    #[test]
    fn room_code_is_recovered_from_id() {
        assert_eq!(room_code_from_doc_id(&room_doc_id("ABCDEF")), Some("ABCDEF"));
        assert_eq!(room_code_from_doc_id("preview::ABCDEF"), None);
    }
}
