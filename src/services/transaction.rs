//! The read-normalize-apply-CAS loop every room mutation goes through.

use std::time::SystemTime;

use tracing::{debug, warn};

use crate::{
    dao::{
        models::RoomDocument,
        room_store::{CasOutcome, RoomStore},
    },
    error::ServiceError,
    state::{normalize::normalize_room, operations::Outcome, room::Room, room_code::RoomCode},
};

/// Result of a transaction that did not fail.
#[derive(Debug)]
pub enum Transacted {
    /// The mutated room was committed.
    Committed(Room),
    /// The operation was a no-op; the room is returned as read.
    Unchanged(Room),
    /// The room and its dependents were deleted.
    Deleted,
}

impl Transacted {
    /// Room snapshot after the transaction, `None` when deleted.
    pub fn room(&self) -> Option<&Room> {
        match self {
            Transacted::Committed(room) | Transacted::Unchanged(room) => Some(room),
            Transacted::Deleted => None,
        }
    }
}

/// Apply `apply` to the current room and commit it with compare-and-swap.
///
/// On a conflict the room is re-read and `apply` runs again against the fresh snapshot,
/// so it must be a pure function of the room it is given. After `max_attempts` lost races
/// the call fails with [`ServiceError::Contention`].
pub async fn transact<F>(
    store: &dyn RoomStore,
    code: &RoomCode,
    max_attempts: u32,
    mut apply: F,
) -> Result<Transacted, ServiceError>
where
    F: FnMut(&mut Room, SystemTime) -> Outcome + Send,
{
    for attempt in 1..=max_attempts {
        let Some(versioned) = store.load_room(code.clone()).await? else {
            return Err(ServiceError::NotFound(format!("room {code} not found")));
        };

        let now = SystemTime::now();
        let mut room = normalize_room(code, versioned.document, now);

        match apply(&mut room, now) {
            Outcome::Unchanged => return Ok(Transacted::Unchanged(room)),
            Outcome::Changed => {
                room.updated_at = now;
                let document = RoomDocument::from(&room);
                match store
                    .compare_and_swap(code.clone(), Some(versioned.revision), document)
                    .await?
                {
                    CasOutcome::Committed(_) => return Ok(Transacted::Committed(room)),
                    CasOutcome::Conflict => {
                        debug!(code = %code, attempt, "room write conflict; retrying")
                    }
                }
            }
            Outcome::Delete => match store.delete_room(code.clone(), versioned.revision).await? {
                CasOutcome::Committed(_) => {
                    if let Err(err) = store.purge_room_data(code.clone()).await {
                        warn!(code = %code, error = %err, "failed to purge room dependents");
                    }
                    debug!(code = %code, "room deleted");
                    return Ok(Transacted::Deleted);
                }
                CasOutcome::Conflict => {
                    debug!(code = %code, attempt, "room delete conflict; retrying")
                }
            },
        }
    }

    warn!(code = %code, attempts = max_attempts, "room mutation gave up after repeated conflicts");
    Err(ServiceError::Contention {
        code: code.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use futures::future::BoxFuture;
    use serde_json::json;

    use super::*;
    use crate::{
        dao::{
            models::{
                AvatarEntity, DrawingEntity, PresenceEntity, RoomListItemEntity,
                RoomPreviewEntity,
            },
            room_store::{Revision, VersionedRoom, memory::MemoryRoomStore},
            storage::StorageResult,
        },
        state::{
            operations,
            room::PlayerStatus,
            state_machine::RoomPhase,
            test_support::{drawing_room, player, room_with_players, t},
        },
    };

    /// Memory store whose first `conflicts` writes lose the race.
    #[derive(Clone)]
    struct FlakyStore {
        inner: MemoryRoomStore,
        conflicts: Arc<AtomicU32>,
        writes: Arc<AtomicU32>,
    }

    impl FlakyStore {
        fn new(inner: MemoryRoomStore, conflicts: u32) -> Self {
            Self {
                inner,
                conflicts: Arc::new(AtomicU32::new(conflicts)),
                writes: Arc::new(AtomicU32::new(0)),
            }
        }

        fn inject_conflict(&self) -> bool {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        }
    }

    impl RoomStore for FlakyStore {
        fn load_room(
            &self,
            code: RoomCode,
        ) -> BoxFuture<'static, StorageResult<Option<VersionedRoom>>> {
            self.inner.load_room(code)
        }

        fn compare_and_swap(
            &self,
            code: RoomCode,
            expected: Option<Revision>,
            document: RoomDocument,
        ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
            if self.inject_conflict() {
                return Box::pin(async { Ok(CasOutcome::Conflict) });
            }
            self.inner.compare_and_swap(code, expected, document)
        }

        fn delete_room(
            &self,
            code: RoomCode,
            expected: Revision,
        ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
            if self.inject_conflict() {
                return Box::pin(async { Ok(CasOutcome::Conflict) });
            }
            self.inner.delete_room(code, expected)
        }

        fn purge_room_data(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.purge_room_data(code)
        }

        fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
            self.inner.list_rooms()
        }

        fn save_drawing(&self, drawing: DrawingEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_drawing(drawing)
        }

        fn find_drawings(
            &self,
            code: RoomCode,
            round_number: u32,
        ) -> BoxFuture<'static, StorageResult<Vec<DrawingEntity>>> {
            self.inner.find_drawings(code, round_number)
        }

        fn heartbeat(&self, presence: PresenceEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.heartbeat(presence)
        }

        fn list_presence(
            &self,
            code: RoomCode,
        ) -> BoxFuture<'static, StorageResult<Vec<PresenceEntity>>> {
            self.inner.list_presence(code)
        }

        fn save_preview(
            &self,
            preview: RoomPreviewEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_preview(preview)
        }

        fn find_preview(
            &self,
            code: RoomCode,
        ) -> BoxFuture<'static, StorageResult<Option<RoomPreviewEntity>>> {
            self.inner.find_preview(code)
        }

        fn save_avatar(&self, avatar: AvatarEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_avatar(avatar)
        }

        fn find_avatar(
            &self,
            player_id: String,
        ) -> BoxFuture<'static, StorageResult<Option<AvatarEntity>>> {
            self.inner.find_avatar(player_id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    async fn seeded(room: &Room) -> MemoryRoomStore {
        let store = MemoryRoomStore::new();
        let outcome = store
            .compare_and_swap(room.code.clone(), None, RoomDocument::from(room))
            .await
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Committed(_)));
        store
    }

    async fn reload(store: &dyn RoomStore, code: &RoomCode) -> Option<Room> {
        store
            .load_room(code.clone())
            .await
            .unwrap()
            .map(|versioned| normalize_room(code, versioned.document, t(0)))
    }

    #[tokio::test]
    async fn conflicts_are_retried_on_a_fresh_snapshot() {
        let room = room_with_players(&["a"]);
        let store = FlakyStore::new(seeded(&room).await, 2);
        let mut calls = 0;

        let result = transact(&store, &room.code, 5, |room, _| {
            calls += 1;
            operations::join_room(room, player("b"))
        })
        .await
        .unwrap();

        assert!(matches!(result, Transacted::Committed(_)));
        assert_eq!(calls, 3);
        let stored = reload(&store, &room.code).await.unwrap();
        assert_eq!(stored.players.len(), 2);
    }

    #[tokio::test]
    async fn exhausted_attempts_report_contention() {
        let room = room_with_players(&["a"]);
        let store = FlakyStore::new(seeded(&room).await, u32::MAX);

        let err = transact(&store, &room.code, 3, |room, _| {
            operations::join_room(room, player("b"))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Contention { attempts: 3, .. }));
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unchanged_outcome_does_not_write() {
        let room = room_with_players(&["a", "b"]);
        let store = FlakyStore::new(seeded(&room).await, 0);

        let result = transact(&store, &room.code, 3, |room, _| {
            operations::join_room(room, player("b"))
        })
        .await
        .unwrap();

        assert!(matches!(result, Transacted::Unchanged(_)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let store = MemoryRoomStore::new();
        let code = RoomCode::parse("NPE222").unwrap();
        let err = transact(&store, &code, 3, |_, _| Outcome::Changed)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn last_leave_deletes_room_and_dependents() {
        let room = drawing_room(&["solo"]);
        let store = seeded(&room).await;
        store
            .save_drawing(DrawingEntity {
                room_code: room.code.to_string(),
                round_number: 1,
                player_id: "solo".into(),
                submission_id: "s1".into(),
                strokes: json!([[0, 0], [1, 1]]),
                submitted_at: t(1),
            })
            .await
            .unwrap();
        store
            .heartbeat(PresenceEntity {
                room_code: room.code.to_string(),
                player_id: "solo".into(),
                last_seen: t(1),
            })
            .await
            .unwrap();

        let flaky = FlakyStore::new(store.clone(), 1);
        let result = transact(&flaky, &room.code, 3, |room, now| {
            let mut rng = rand::rng();
            operations::leave_room(room, "solo", &mut rng, now)
        })
        .await
        .unwrap();

        assert!(matches!(result, Transacted::Deleted));
        assert!(reload(&store, &room.code).await.is_none());
        assert!(store.find_drawings(room.code.clone(), 1).await.unwrap().is_empty());
        assert!(store.list_presence(room.code.clone()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_land_exactly_once() {
        let ids = ["a", "b", "c", "d", "e", "f"];
        let room = drawing_room(&ids);
        let store = FlakyStore::new(seeded(&room).await, 4);

        let mut tasks = Vec::new();
        for id in ids {
            let store = store.clone();
            let code = room.code.clone();
            tasks.push(tokio::spawn(async move {
                // Each player submits twice to exercise the duplicate guard as well.
                for _ in 0..2 {
                    transact(&store, &code, 64, |room, now| {
                        operations::submit_drawing(room, id, &format!("{code}:1:{id}"), now)
                    })
                    .await
                    .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = reload(&store, &room.code).await.unwrap();
        assert_eq!(stored.phase, RoomPhase::Voting);
        assert_eq!(stored.player_states.len(), ids.len());
        for id in ids {
            let state = &stored.player_states[id];
            assert_eq!(state.status, PlayerStatus::Submitted);
            assert_eq!(state.drawing_key.as_deref(), Some(format!("ABCDEF:1:{id}").as_str()));
        }
    }
}
