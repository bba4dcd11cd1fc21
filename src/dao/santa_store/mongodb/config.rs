use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Runtime configuration describing how to connect to MongoDB.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options derived from the connection string.
    pub options: ClientOptions,
    /// Database holding the game and participant collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection string, optionally overriding the database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or("santa_back").to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }
}
