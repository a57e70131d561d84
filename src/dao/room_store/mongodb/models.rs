use serde::{Deserialize, Serialize};

use crate::dao::models::RoomDocument;

/// Room document with the version counter used as the CAS guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    pub code: String,
    pub revision: i64,
    #[serde(flatten)]
    pub room: RoomDocument,
}

/// Side keyspace entry stored under an explicit `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoKeyedDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> MongoKeyedDocument<T> {
    pub fn new(id: String, body: T) -> Self {
        Self { id, body }
    }
}

pub fn presence_id(code: &str, player_id: &str) -> String {
    format!("{code}:{player_id}")
}

/// Revisions are the decimal representation of the counter.
pub fn parse_revision(revision: &str) -> Option<i64> {
    revision.parse().ok()
}
