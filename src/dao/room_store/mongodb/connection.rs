use std::time::Duration;

use mongodb::{Client, Database, bson::doc, error::Error as MongoError, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const PING_ATTEMPTS: u32 = 3;
const PING_STEP: Duration = Duration::from_millis(500);

/// Open a client on `database_name` and wait briefly for the deployment to answer.
///
/// Long-running backoff belongs to the storage supervisor, not to this call.
pub async fn open_database(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempt = 1;
    loop {
        let Err(source) = ping(&database).await else {
            return Ok((client, database));
        };
        if attempt >= PING_ATTEMPTS {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source,
            });
        }
        debug!(attempt, database = database_name, error = %source, "MongoDB not answering yet");
        sleep(PING_STEP * attempt).await;
        attempt += 1;
    }
}

/// Round-trip a `ping` command.
pub async fn ping(database: &Database) -> Result<(), MongoError> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}
