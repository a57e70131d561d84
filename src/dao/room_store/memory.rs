//! Process-local room store. Used when no database is configured and by the test suite.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{
            AvatarEntity, DrawingEntity, PresenceEntity, RoomDocument, RoomListItemEntity,
            RoomPreviewEntity,
        },
        room_store::{CasOutcome, Revision, RoomStore, VersionedRoom},
        storage::StorageResult,
    },
    state::room_code::RoomCode,
};

#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<String, VersionedRoom>,
    /// Keyed by [`DrawingEntity::key`].
    drawings: DashMap<String, DrawingEntity>,
    /// Keyed by `(room code, player id)`.
    presence: DashMap<(String, String), PresenceEntity>,
    previews: DashMap<String, RoomPreviewEntity>,
    avatars: DashMap<String, AvatarEntity>,
    revision_counter: AtomicU64,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> Revision {
        let value = self.inner.revision_counter.fetch_add(1, Ordering::Relaxed) + 1;
        Revision::new(value.to_string())
    }

    fn compare_and_swap_sync(
        &self,
        code: &RoomCode,
        expected: Option<Revision>,
        document: RoomDocument,
    ) -> CasOutcome {
        match (self.inner.rooms.entry(code.to_string()), expected) {
            (Entry::Vacant(slot), None) => {
                let revision = self.next_revision();
                slot.insert(VersionedRoom {
                    revision: revision.clone(),
                    document,
                });
                CasOutcome::Committed(revision)
            }
            (Entry::Occupied(mut slot), Some(expected)) if slot.get().revision == expected => {
                let revision = self.next_revision();
                slot.insert(VersionedRoom {
                    revision: revision.clone(),
                    document,
                });
                CasOutcome::Committed(revision)
            }
            _ => CasOutcome::Conflict,
        }
    }

    fn delete_room_sync(&self, code: &RoomCode, expected: Revision) -> CasOutcome {
        match self.inner.rooms.entry(code.to_string()) {
            Entry::Occupied(slot) if slot.get().revision == expected => {
                slot.remove();
                CasOutcome::Committed(expected)
            }
            _ => CasOutcome::Conflict,
        }
    }

    fn purge_room_data_sync(&self, code: &RoomCode) {
        let prefix = format!("{code}:");
        self.inner
            .drawings
            .retain(|key, _| !key.starts_with(&prefix));
        self.inner
            .presence
            .retain(|(room, _), _| room != code.as_str());
        self.inner.previews.remove(code.as_str());
    }
}

impl RoomStore for MemoryRoomStore {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<VersionedRoom>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rooms
                .get(code.as_str())
                .map(|entry| entry.value().clone()))
        })
    }

    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Option<Revision>,
        document: RoomDocument,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.compare_and_swap_sync(&code, expected, document)) })
    }

    fn delete_room(
        &self,
        code: RoomCode,
        expected: Revision,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_room_sync(&code, expected)) })
    }

    fn purge_room_data(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.purge_room_data_sync(&code);
            Ok(())
        })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rooms
                .iter()
                .map(|entry| RoomListItemEntity {
                    code: entry.key().clone(),
                    created_at: entry.value().document.created_at,
                })
                .collect())
        })
    }

    fn save_drawing(&self, drawing: DrawingEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.drawings.insert(drawing.key(), drawing);
            Ok(())
        })
    }

    fn find_drawings(
        &self,
        code: RoomCode,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<DrawingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .drawings
                .iter()
                .filter(|entry| {
                    entry.room_code == code.as_str() && entry.round_number == round_number
                })
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn heartbeat(&self, presence: PresenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (presence.room_code.clone(), presence.player_id.clone());
            store.inner.presence.insert(key, presence);
            Ok(())
        })
    }

    fn list_presence(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Vec<PresenceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .presence
                .iter()
                .filter(|entry| entry.room_code == code.as_str())
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn save_preview(&self, preview: RoomPreviewEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .previews
                .insert(preview.room_code.clone(), preview);
            Ok(())
        })
    }

    fn find_preview(
        &self,
        code: RoomCode,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPreviewEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .previews
                .get(code.as_str())
                .map(|entry| entry.value().clone()))
        })
    }

    fn save_avatar(&self, avatar: AvatarEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .avatars
                .insert(avatar.player_id.clone(), avatar);
            Ok(())
        })
    }

    fn find_avatar(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<AvatarEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .avatars
                .get(&player_id)
                .map(|entry| entry.value().clone()))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use serde_json::json;

    use super::*;

    fn code() -> RoomCode {
        RoomCode::parse("QWERTY").unwrap()
    }

    fn committed(outcome: CasOutcome) -> Revision {
        match outcome {
            CasOutcome::Committed(revision) => revision,
            CasOutcome::Conflict => panic!("expected a committed write"),
        }
    }

    #[tokio::test]
    async fn create_conflicts_when_code_is_taken() {
        let store = MemoryRoomStore::new();
        let doc = RoomDocument::default();
        committed(store.compare_and_swap(code(), None, doc.clone()).await.unwrap());
        assert_eq!(
            store.compare_and_swap(code(), None, doc).await.unwrap(),
            CasOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let store = MemoryRoomStore::new();
        let first = committed(
            store
                .compare_and_swap(code(), None, RoomDocument::default())
                .await
                .unwrap(),
        );
        let updated = RoomDocument {
            round_number: Some(1),
            ..RoomDocument::default()
        };
        let second = committed(
            store
                .compare_and_swap(code(), Some(first.clone()), updated.clone())
                .await
                .unwrap(),
        );
        assert_ne!(first, second);
        assert_eq!(
            store
                .compare_and_swap(code(), Some(first.clone()), RoomDocument::default())
                .await
                .unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(
            store.delete_room(code(), first).await.unwrap(),
            CasOutcome::Conflict
        );

        let loaded = store.load_room(code()).await.unwrap().unwrap();
        assert_eq!(loaded.revision, second);
        assert_eq!(loaded.document, updated);
    }

    #[tokio::test]
    async fn purge_drops_dependents_of_one_room_only() {
        let store = MemoryRoomStore::new();
        let other = RoomCode::parse("ZXCVBN").unwrap();
        for room in [code(), other.clone()] {
            store
                .save_drawing(DrawingEntity {
                    room_code: room.to_string(),
                    round_number: 1,
                    player_id: "a".into(),
                    submission_id: "s1".into(),
                    strokes: json!([]),
                    submitted_at: SystemTime::UNIX_EPOCH,
                })
                .await
                .unwrap();
            store
                .heartbeat(PresenceEntity {
                    room_code: room.to_string(),
                    player_id: "a".into(),
                    last_seen: SystemTime::UNIX_EPOCH,
                })
                .await
                .unwrap();
        }

        store.purge_room_data(code()).await.unwrap();
        assert!(store.find_drawings(code(), 1).await.unwrap().is_empty());
        assert!(store.list_presence(code()).await.unwrap().is_empty());
        assert_eq!(store.find_drawings(other.clone(), 1).await.unwrap().len(), 1);
        assert_eq!(store.list_presence(other).await.unwrap().len(), 1);
    }
}
