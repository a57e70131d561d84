#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{fmt, time::SystemTime};

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{
            AvatarEntity, DrawingEntity, PresenceEntity, RoomDocument, RoomListItemEntity,
            RoomPreviewEntity,
        },
        storage::StorageResult,
    },
    state::room_code::RoomCode,
};

/// Opaque version token of a stored room document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Room document together with the revision it was read at.
#[derive(Debug, Clone)]
pub struct VersionedRoom {
    pub revision: Revision,
    pub document: RoomDocument,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; the document now carries this revision.
    Committed(Revision),
    /// Another writer got there first; re-read and retry.
    Conflict,
}

/// Persistence for rooms and their dependent keyspaces.
///
/// The room document is only ever written through [`RoomStore::compare_and_swap`] and
/// [`RoomStore::delete_room`]. Drawings, presence, previews and avatars live in separate
/// keyspaces so that writing them never races with room mutations.
pub trait RoomStore: Send + Sync {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<VersionedRoom>>>;
    /// Write `document` if the stored revision still equals `expected`.
    /// `expected = None` creates the room and conflicts when the code is taken.
    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Option<Revision>,
        document: RoomDocument,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Delete the room document if the stored revision still equals `expected`.
    /// The returned revision on success is the one that was deleted.
    fn delete_room(
        &self,
        code: RoomCode,
        expected: Revision,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>>;
    /// Drop the drawings, presence and preview of a deleted room.
    fn purge_room_data(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<()>>;
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>>;
    fn save_drawing(&self, drawing: DrawingEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_drawings(
        &self,
        code: RoomCode,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<DrawingEntity>>>;
    fn heartbeat(&self, presence: PresenceEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_presence(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Vec<PresenceEntity>>>;
    fn save_preview(&self, preview: RoomPreviewEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_preview(
        &self,
        code: RoomCode,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPreviewEntity>>>;
    fn save_avatar(&self, avatar: AvatarEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_avatar(&self, player_id: String)
    -> BoxFuture<'static, StorageResult<Option<AvatarEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Whether a room created at `created_at` has outlived `max_age` at `now`.
pub fn is_expired(
    created_at: Option<SystemTime>,
    now: SystemTime,
    max_age: std::time::Duration,
) -> bool {
    created_at
        .and_then(|created| now.duration_since(created).ok())
        .is_some_and(|age| age > max_age)
}
