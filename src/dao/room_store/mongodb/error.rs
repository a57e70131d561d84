use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{code}`")]
    LoadRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write room `{code}`")]
    WriteRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete room `{code}`")]
    DeleteRoom {
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list rooms")]
    ListRooms {
        #[source]
        source: MongoError,
    },
    #[error("failed to purge `{collection}` for room `{code}`")]
    Purge {
        collection: &'static str,
        code: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write `{key}` into `{collection}`")]
    SaveSide {
        collection: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to read from `{collection}`")]
    FindSide {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
}
