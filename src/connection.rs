use std::{future::Future, time::Duration};

use sqlx::{
    Connection as _, PgConnection,
    postgres::{PgConnectOptions, PgRow},
};
use tracing::{debug, info};

use crate::{errors::DatabaseError, options::ConnectionOptions};

/// SQLSTATE for an unknown database
const INVALID_CATALOG_NAME: &str = "3D000";
/// SQLSTATEs for rejected credentials
const INVALID_PASSWORD: &str = "28P01";
const INVALID_AUTHORIZATION: &str = "28000";

/// Something a statement can be run on
pub trait Executable {
    type Row;
    fn run(
        &mut self,
        statement: &str,
    ) -> impl Future<Output = Result<Vec<Self::Row>, DatabaseError>>;
}

/// A single session on a Redshift cluster
#[derive(Debug)]
pub struct RedshiftConnection {
    connection: PgConnection,
}

impl RedshiftConnection {
    pub async fn connect(options: &ConnectionOptions) -> Result<Self, ConnectError> {
        let connect_options = PgConnectOptions::new()
            .host(&options.host)
            .port(options.port)
            .database(&options.database)
            .username(&options.user)
            .password(&options.password);
        debug!(
            host = %options.host,
            port = options.port,
            database = %options.database,
            "connecting"
        );
        let timeout = Duration::from_secs(options.connect_timeout_secs);
        let connection = tokio::time::timeout(timeout, PgConnection::connect_with(&connect_options))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))?
            .map_err(|error| ConnectError::classify(error, options))?;
        info!(host = %options.host, database = %options.database, "connected");
        Ok(RedshiftConnection { connection })
    }
    pub async fn close(self) -> Result<(), DatabaseError> {
        Ok(self.connection.close().await?)
    }
}

impl From<PgConnection> for RedshiftConnection {
    fn from(connection: PgConnection) -> Self {
        RedshiftConnection { connection }
    }
}

impl AsMut<PgConnection> for RedshiftConnection {
    fn as_mut(&mut self) -> &mut PgConnection {
        &mut self.connection
    }
}

impl Executable for RedshiftConnection {
    type Row = PgRow;
    async fn run(&mut self, statement: &str) -> Result<Vec<PgRow>, DatabaseError> {
        // Simple query protocol, Redshift does not prepare COPY
        let rows = sqlx::raw_sql(statement)
            .fetch_all(&mut self.connection)
            .await?;
        Ok(rows)
    }
}

/// Error opening a [RedshiftConnection]
#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("host {host} is unknown or inaccessible: {source}")]
    HostUnknownOrInaccessible { host: String, source: sqlx::Error },
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),
    #[error("database {database} does not exist: {source}")]
    NoDatabase { database: String, source: sqlx::Error },
    #[error("authentication failed for user {user}: {source}")]
    Authentication { user: String, source: sqlx::Error },
    #[error("could not connect: {0}")]
    Unknown(sqlx::Error),
}

impl ConnectError {
    fn classify(error: sqlx::Error, options: &ConnectionOptions) -> Self {
        if matches!(error, sqlx::Error::Io(_)) {
            return ConnectError::HostUnknownOrInaccessible {
                host: options.host.clone(),
                source: error,
            };
        }
        let code = match &error {
            sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            Some(INVALID_CATALOG_NAME) => ConnectError::NoDatabase {
                database: options.database.clone(),
                source: error,
            },
            Some(INVALID_PASSWORD | INVALID_AUTHORIZATION) => ConnectError::Authentication {
                user: options.user.clone(),
                source: error,
            },
            _ => ConnectError::Unknown(error),
        }
    }
}
