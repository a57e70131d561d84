use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "doodle_party";
const APP_NAME: &str = "doodle-party-back";
/// Upper bound for server selection on every operation.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Parsed client options plus the database holding the room collections.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`; an explicit `db_name` wins over the URI's default database.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        let database_name = db_name
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        options
            .server_selection_timeout
            .get_or_insert(SERVER_SELECTION_TIMEOUT);

        Ok(Self {
            options,
            database_name,
        })
    }

    /// `MONGO_URI` is required; `MONGO_DB` overrides the database name.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok().filter(|db| !db.is_empty());
        Self::from_uri(&uri, db.as_deref()).await
    }
}
