use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tracing::debug;

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

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, AllDocsRow, BulkDocsRequest, CouchDocument, DeletedDocument,
        END_SUFFIX, ROOM_PREFIX, WriteResponse, avatar_doc_id, drawing_doc_id, drawing_prefix,
        presence_doc_id, presence_prefix, preview_doc_id, room_code_from_doc_id, room_doc_id,
    },
};

/// Side documents are last-writer-wins; a conflicting upsert re-reads the revision.
const UPSERT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url);
        let database = Arc::<str>::from(config.database);
        let auth = config
            .credentials
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_request(&self, method: Method) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, self.database);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        let builder = self.client.request(method, url);
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .database_request(Method::PUT)
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412: created concurrently by another instance.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let raw = response.json::<serde_json::Value>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                from_value(raw)
                    .map(Some)
                    .map_err(|source| CouchDaoError::DeserializeValue {
                        path: doc_id.to_string(),
                        source,
                    })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Conditional `PUT`: `None` on a revision conflict.
    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<Option<String>>
    where
        T: Serialize,
    {
        let doc_id = document.id.as_str();
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(None),
            status if status.is_success() => {
                let written = response.json::<WriteResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(Some(written.rev))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// Last-writer-wins write used for the side keyspaces.
    async fn upsert_document<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize,
    {
        let mut document = CouchDocument::new(doc_id, None, body);
        for _ in 0..UPSERT_ATTEMPTS {
            document.rev = self
                .get_document::<serde_json::Value>(&document.id)
                .await?
                .and_then(|existing| existing.rev);
            if self.put_document(&document).await?.is_some() {
                return Ok(());
            }
            debug!(doc_id = %document.id, "CouchDB upsert conflict; retrying");
        }
        Err(CouchDaoError::UpsertConflict {
            path: document.id,
            attempts: UPSERT_ATTEMPTS,
        })
    }

    async fn list_rows(&self, prefix: &str, include_docs: bool) -> CouchResult<Vec<AllDocsRow>> {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", include_docs.to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        Ok(payload.rows)
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let mut documents = Vec::new();
        for row in self.list_rows(prefix, true).await? {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id.clone(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    async fn load_room(&self, code: &RoomCode) -> CouchResult<Option<VersionedRoom>> {
        let doc_id = room_doc_id(code.as_str());
        let Some(document) = self.get_document::<RoomDocument>(&doc_id).await? else {
            return Ok(None);
        };
        let rev = document
            .rev
            .ok_or(CouchDaoError::MissingRevision { path: doc_id })?;
        Ok(Some(VersionedRoom {
            revision: Revision::new(rev),
            document: document.body,
        }))
    }

    async fn compare_and_swap(
        &self,
        code: &RoomCode,
        expected: Option<Revision>,
        document: RoomDocument,
    ) -> CouchResult<CasOutcome> {
        let document = CouchDocument::new(
            room_doc_id(code.as_str()),
            expected.map(|rev| rev.as_str().to_owned()),
            document,
        );
        Ok(match self.put_document(&document).await? {
            Some(rev) => CasOutcome::Committed(Revision::new(rev)),
            None => CasOutcome::Conflict,
        })
    }

    async fn delete_room(&self, code: &RoomCode, expected: Revision) -> CouchResult<CasOutcome> {
        let doc_id = room_doc_id(code.as_str());
        let response = self
            .request(Method::DELETE, &doc_id)
            .query(&[("rev", expected.as_str())])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::NOT_FOUND => Ok(CasOutcome::Conflict),
            status if status.is_success() => Ok(CasOutcome::Committed(expected)),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id,
                status: other,
            }),
        }
    }

    async fn purge_room_data(&self, code: &RoomCode) -> CouchResult<()> {
        let mut rows = self
            .list_rows(&drawing_prefix(code.as_str(), None), false)
            .await?;
        rows.extend(self.list_rows(&presence_prefix(code.as_str()), false).await?);
        // Exact-id listing of the preview document.
        let preview_id = preview_doc_id(code.as_str());
        rows.extend(
            self.list_rows(&preview_id, false)
                .await?
                .into_iter()
                .filter(|row| row.id == preview_id),
        );

        let docs: Vec<DeletedDocument> = rows
            .into_iter()
            .filter_map(|row| {
                row.value.map(|value| DeletedDocument {
                    id: row.id,
                    rev: value.rev,
                    deleted: true,
                })
            })
            .collect();
        if docs.is_empty() {
            return Ok(());
        }

        const BULK_DOCS: &str = "_bulk_docs";
        let count = docs.len();
        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            });
        }
        debug!(code = %code, count, "purged CouchDB room dependents");
        Ok(())
    }

    async fn list_rooms(&self) -> CouchResult<Vec<RoomListItemEntity>> {
        let docs = self.list_documents::<RoomDocument>(ROOM_PREFIX).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let code = room_code_from_doc_id(&doc.id)?.to_owned();
                Some(RoomListItemEntity {
                    code,
                    created_at: doc.body.created_at,
                })
            })
            .collect())
    }

    async fn health_check(&self) -> CouchResult<()> {
        let path = format!("{}/{}", self.base_url, self.database);
        let response = self
            .database_request(Method::GET)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }
}

fn bodies<T>(documents: Vec<CouchDocument<T>>) -> Vec<T> {
    documents.into_iter().map(|doc| doc.body).collect()
}

impl RoomStore for CouchRoomStore {
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
            let doc_id = drawing_doc_id(&drawing.key());
            store
                .upsert_document(doc_id, drawing)
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
            let docs = store
                .list_documents::<DrawingEntity>(&drawing_prefix(code.as_str(), Some(round_number)))
                .await?;
            Ok(bodies(docs))
        })
    }

    fn heartbeat(&self, presence: PresenceEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = presence_doc_id(&presence.room_code, &presence.player_id);
            store
                .upsert_document(doc_id, presence)
                .await
                .map_err(Into::into)
        })
    }

    fn list_presence(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Vec<PresenceEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<PresenceEntity>(&presence_prefix(code.as_str()))
                .await?;
            Ok(bodies(docs))
        })
    }

    fn save_preview(&self, preview: RoomPreviewEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = preview_doc_id(&preview.room_code);
            store
                .upsert_document(doc_id, preview)
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
            let doc = store
                .get_document::<RoomPreviewEntity>(&preview_doc_id(code.as_str()))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn save_avatar(&self, avatar: AvatarEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = avatar_doc_id(&avatar.player_id);
            store
                .upsert_document(doc_id, avatar)
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
            let doc = store
                .get_document::<AvatarEntity>(&avatar_doc_id(&player_id))
                .await?;
            Ok(doc.map(|doc| doc.body))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.health_check().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
