mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchRoomStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        let corrupt_key = match &err {
            CouchDaoError::DeserializeValue { path, .. } | CouchDaoError::MissingRevision { path } => {
                Some(path.clone())
            }
            _ => None,
        };
        match corrupt_key {
            Some(key) => StorageError::corrupt(key, err),
            None => StorageError::unavailable(err.to_string(), err),
        }
    }
}
