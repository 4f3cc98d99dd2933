/// SQLSTATE Redshift reports for failed loads and most COPY option errors
pub const INTERNAL_ERROR: &str = "XX000";

/// Broad category of a failed database call
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DatabaseErrorKind {
    /// The server rejected the statement with an internal error (`XX000`)
    Internal,
    /// The connection itself failed: I/O, TLS, protocol, pool
    Connection,
    Other,
}

/// Raw error reported by a database call, before any classification
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
#[error("{message}")]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
    message: String,
    code: Option<String>,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        DatabaseError {
            kind,
            message: message.into(),
            code: None,
        }
    }
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }
    pub fn message(&self) -> &str {
        &self.message
    }
    /// SQLSTATE, when the server sent one
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db) => {
                let kind = match db.code().as_deref() {
                    Some(INTERNAL_ERROR) => DatabaseErrorKind::Internal,
                    _ => DatabaseErrorKind::Other,
                };
                DatabaseError {
                    kind,
                    message: db.message().to_owned(),
                    code: db.code().map(|code| code.into_owned()),
                }
            }
            error @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => {
                DatabaseError::new(DatabaseErrorKind::Connection, error.to_string())
            }
            error => DatabaseError::new(DatabaseErrorKind::Other, error.to_string()),
        }
    }
}

/// A `COPY` that failed in a recognized way, or an unrecognized failure passed through
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// The source prefix does not exist or is not visible to the cluster
    #[error("data source does not exist: {0}")]
    DataSource(String),
    /// The bucket lives in a different region than the cluster
    #[error(
        "the bucket appears to be in a different region than the cluster, specify the \"REGION 'bucket-region'\" option: {0}"
    )]
    OtherZoneBucket(String),
    #[error("Syntax error in the COPY command: [{location}].")]
    Syntax { location: String, message: String },
    /// A syntax error whose location could not be read from the message
    #[error("syntax error in the COPY command, location unknown: {0}")]
    SyntaxLocationMissing(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Rejected [CopyCommand](crate::CopyCommand) input, raised before anything reaches the network
#[derive(thiserror::Error, Clone, PartialEq, Eq, Debug)]
pub enum ValidationError {
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("columns must be an array, got {0}")]
    ColumnsNotAnArray(&'static str),
    #[error("column at index {index} must be a string, got {found}")]
    ColumnNotAString { index: usize, found: &'static str },
}
