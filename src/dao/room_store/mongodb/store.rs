use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::{open_database, ping},
    error::{MongoDaoError, MongoResult},
    models::{MongoKeyedDocument, MongoRoomDocument, parse_revision, presence_id},
};
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

const ROOM_COLLECTION_NAME: &str = "rooms";
const DRAWING_COLLECTION_NAME: &str = "drawings";
const PRESENCE_COLLECTION_NAME: &str = "presence";
const PREVIEW_COLLECTION_NAME: &str = "previews";
const AVATAR_COLLECTION_NAME: &str = "avatars";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            open_database(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            open_database(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let drawings = database.collection::<Document>(DRAWING_COLLECTION_NAME);
        let drawing_index = IndexModel::builder()
            .keys(doc! { "roomCode": 1, "roundNumber": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("drawing_room_round_idx".to_owned()))
                    .build(),
            )
            .build();
        drawings
            .create_index(drawing_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DRAWING_COLLECTION_NAME,
                index: "roomCode,roundNumber",
                source,
            })?;

        let presence = database.collection::<Document>(PRESENCE_COLLECTION_NAME);
        let presence_index = IndexModel::builder()
            .keys(doc! { "roomCode": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("presence_room_idx".to_owned()))
                    .build(),
            )
            .build();
        presence
            .create_index(presence_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PRESENCE_COLLECTION_NAME,
                index: "roomCode",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        self.database()
            .await
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn keyed<T>(&self, name: &str) -> Collection<MongoKeyedDocument<T>>
    where
        T: Send + Sync,
    {
        self.database()
            .await
            .collection::<MongoKeyedDocument<T>>(name)
    }

    async fn load_room(&self, code: &RoomCode) -> MongoResult<Option<VersionedRoom>> {
        let document = self
            .rooms()
            .await
            .find_one(doc! { "_id": code.as_str() })
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                code: code.to_string(),
                source,
            })?;

        Ok(document.map(|doc| VersionedRoom {
            revision: Revision::new(doc.revision.to_string()),
            document: doc.room,
        }))
    }

    async fn compare_and_swap(
        &self,
        code: &RoomCode,
        expected: Option<Revision>,
        room: RoomDocument,
    ) -> MongoResult<CasOutcome> {
        let collection = self.rooms().await;

        let Some(expected) = expected else {
            let document = MongoRoomDocument {
                code: code.to_string(),
                revision: 1,
                room,
            };
            return match collection.insert_one(&document).await {
                Ok(_) => Ok(CasOutcome::Committed(Revision::new("1"))),
                Err(err) if is_duplicate_key(&err) => Ok(CasOutcome::Conflict),
                Err(source) => Err(MongoDaoError::WriteRoom {
                    code: code.to_string(),
                    source,
                }),
            };
        };

        let Some(current) = parse_revision(expected.as_str()) else {
            return Ok(CasOutcome::Conflict);
        };
        let next = current + 1;
        let document = MongoRoomDocument {
            code: code.to_string(),
            revision: next,
            room,
        };
        let result = collection
            .replace_one(
                doc! { "_id": code.as_str(), "revision": current },
                &document,
            )
            .await
            .map_err(|source| MongoDaoError::WriteRoom {
                code: code.to_string(),
                source,
            })?;

        if result.matched_count == 1 {
            Ok(CasOutcome::Committed(Revision::new(next.to_string())))
        } else {
            debug!(code = %code, revision = current, "MongoDB room revision moved");
            Ok(CasOutcome::Conflict)
        }
    }

    async fn delete_room(&self, code: &RoomCode, expected: Revision) -> MongoResult<CasOutcome> {
        let Some(current) = parse_revision(expected.as_str()) else {
            return Ok(CasOutcome::Conflict);
        };
        let result = self
            .rooms()
            .await
            .delete_one(doc! { "_id": code.as_str(), "revision": current })
            .await
            .map_err(|source| MongoDaoError::DeleteRoom {
                code: code.to_string(),
                source,
            })?;

        Ok(if result.deleted_count == 1 {
            CasOutcome::Committed(expected)
        } else {
            CasOutcome::Conflict
        })
    }

    async fn purge_room_data(&self, code: &RoomCode) -> MongoResult<()> {
        let database = self.database().await;
        let by_room = [
            (DRAWING_COLLECTION_NAME, doc! { "roomCode": code.as_str() }),
            (PRESENCE_COLLECTION_NAME, doc! { "roomCode": code.as_str() }),
            (PREVIEW_COLLECTION_NAME, doc! { "_id": code.as_str() }),
        ];

        for (collection, filter) in by_room {
            let result = database
                .collection::<Document>(collection)
                .delete_many(filter)
                .await
                .map_err(|source| MongoDaoError::Purge {
                    collection,
                    code: code.to_string(),
                    source,
                })?;
            debug!(code = %code, collection, deleted = result.deleted_count, "purged room dependents");
        }
        Ok(())
    }

    async fn list_rooms(&self) -> MongoResult<Vec<RoomListItemEntity>> {
        let documents: Vec<MongoRoomDocument> = self
            .rooms()
            .await
            .find(doc! {})
            .projection(doc! { "_id": 1, "revision": 1, "createdAt": 1 })
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?;

        Ok(documents
            .into_iter()
            .map(|doc| RoomListItemEntity {
                code: doc.code,
                created_at: doc.room.created_at,
            })
            .collect())
    }

    async fn upsert<T>(&self, collection: &'static str, id: String, body: T) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let document = MongoKeyedDocument::new(id, body);
        self.keyed::<T>(collection)
            .await
            .replace_one(doc! { "_id": document.id.as_str() }, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSide {
                collection,
                key: document.id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn find_many<T>(&self, collection: &'static str, filter: Document) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let documents: Vec<MongoKeyedDocument<T>> = self
            .keyed::<T>(collection)
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::FindSide { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::FindSide { collection, source })?;
        Ok(documents.into_iter().map(|doc| doc.body).collect())
    }

    async fn find_by_id<T>(&self, collection: &'static str, id: &str) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let document = self
            .keyed::<T>(collection)
            .await
            .find_one(doc! { "_id": id })
            .await
            .map_err(|source| MongoDaoError::FindSide { collection, source })?;
        Ok(document.map(|doc| doc.body))
    }
}

impl RoomStore for MongoRoomStore {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<VersionedRoom>>> {
        let store = self.clone();
        Box::pin(async move { store.load_room(&code).await.map_err(Into::into) })
    }

    fn compare_and_swap(
        &self,
        code: RoomCode,
        expected: Option<Revision>,
        document: RoomDocument,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap(&code, expected, document)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_room(
        &self,
        code: RoomCode,
        expected: Revision,
    ) -> BoxFuture<'static, StorageResult<CasOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(&code, expected).await.map_err(Into::into) })
    }

    fn purge_room_data(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.purge_room_data(&code).await.map_err(Into::into) })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rooms().await.map_err(Into::into) })
    }

    fn save_drawing(&self, drawing: DrawingEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert(DRAWING_COLLECTION_NAME, drawing.key(), drawing)
                .await
                .map_err(Into::into)
        })
    }

    fn find_drawings(
        &self,
        code: RoomCode,
        round_number: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<DrawingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many(
                    DRAWING_COLLECTION_NAME,
                    doc! { "roomCode": code.as_str(), "roundNumber": i64::from(round_number) },
                )
                .await
                .map_err(Into::into)
        })
    }

    fn heartbeat(&self, presence: PresenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = presence_id(&presence.room_code, &presence.player_id);
            store
                .upsert(PRESENCE_COLLECTION_NAME, id, presence)
                .await
                .map_err(Into::into)
        })
    }

    fn list_presence(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Vec<PresenceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_many(PRESENCE_COLLECTION_NAME, doc! { "roomCode": code.as_str() })
                .await
                .map_err(Into::into)
        })
    }

    fn save_preview(&self, preview: RoomPreviewEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = preview.room_code.clone();
            store
                .upsert(PREVIEW_COLLECTION_NAME, id, preview)
                .await
                .map_err(Into::into)
        })
    }

    fn find_preview(
        &self,
        code: RoomCode,
    ) -> BoxFuture<'static, StorageResult<Option<RoomPreviewEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_id(PREVIEW_COLLECTION_NAME, code.as_str())
                .await
                .map_err(Into::into)
        })
    }

    fn save_avatar(&self, avatar: AvatarEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = avatar.player_id.clone();
            store
                .upsert(AVATAR_COLLECTION_NAME, id, avatar)
                .await
                .map_err(Into::into)
        })
    }

    fn find_avatar(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<AvatarEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_by_id(AVATAR_COLLECTION_NAME, &player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
