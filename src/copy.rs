use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    classifier::{self, Classification},
    connection::Executable,
    errors::{CopyError, ValidationError},
    load_errors::{LoadError, LoadErrorFetcher},
};

/// AWS credentials the cluster uses to read the data source
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Credentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
    /// Value of the `CREDENTIALS` clause. A blank token is left out.
    pub fn fragment(&self) -> String {
        match self.session_token.as_deref() {
            Some(token) if !token.trim().is_empty() => format!(
                "aws_access_key_id={};aws_secret_access_key={};token={token}",
                self.access_key_id, self.secret_access_key
            ),
            _ => format!(
                "aws_access_key_id={};aws_secret_access_key={}",
                self.access_key_id, self.secret_access_key
            ),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Result of a `COPY` that did not fail outright
#[derive(Debug)]
pub enum CopyOutcome {
    /// Every row was loaded. A `COPY` never returns rows, so there are none to carry.
    Loaded,
    /// The load was rejected, these rows explain why
    LoadErrors(Vec<LoadError>),
}

/// A Redshift `COPY` statement.
///
/// Nothing is escaped or quoted: table name, columns, data source and options are
/// written into the statement as given.
///
/// [Reference](http://docs.aws.amazon.com/redshift/latest/dg/r_COPY.html)
#[derive(Clone, Debug)]
pub struct CopyCommand {
    table_name: String,
    data_source: String,
    credentials: Credentials,
    columns: Vec<String>,
    options: String,
}

impl CopyCommand {
    pub fn try_new(
        table_name: impl Into<String>,
        data_source: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, ValidationError> {
        let table_name = table_name.into();
        if table_name.trim().is_empty() {
            return Err(ValidationError::EmptyTableName);
        }
        Ok(CopyCommand {
            table_name,
            data_source: data_source.into(),
            credentials,
            columns: Vec::new(),
            options: String::new(),
        })
    }
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
    pub fn data_source(&self) -> &str {
        &self.data_source
    }
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn options(&self) -> &str {
        &self.options
    }
    pub fn set_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
    }
    /// Set the columns from an untyped value, such as an options file entry.
    ///
    /// Anything but an array of strings is rejected and the current columns are kept.
    pub fn set_columns_value(&mut self, value: &serde_json::Value) -> Result<(), ValidationError> {
        let serde_json::Value::Array(values) = value else {
            return Err(ValidationError::ColumnsNotAnArray(json_type(value)));
        };
        let columns = values
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                serde_json::Value::String(column) => Ok(column.clone()),
                other => Err(ValidationError::ColumnNotAString {
                    index,
                    found: json_type(other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.columns = columns;
        Ok(())
    }
    pub fn set_options(&mut self, options: impl Into<String>) {
        self.options = options.into();
    }
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_columns(columns);
        self
    }
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.set_options(options);
        self
    }
    /// The statement sent to the cluster.
    ///
    /// Fields are joined by single spaces, so an empty column list leaves two spaces
    /// between the table name and `FROM`.
    pub fn statement(&self) -> String {
        self.render(&self.credentials.fragment())
    }
    /// [statement](Self::statement) with the credentials masked, safe to log.
    pub fn redacted_statement(&self) -> String {
        self.render("***")
    }
    fn render(&self, credentials: &str) -> String {
        format!(
            "COPY {} {} FROM '{}' CREDENTIALS '{}' {}",
            self.table_name,
            self.column_clause(),
            self.data_source,
            credentials,
            self.options
        )
    }
    fn column_clause(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        format!("({})", self.columns.join(", ").trim())
    }

    /// Run the statement and classify how it went.
    ///
    /// Rejected rows are looked up through `fetcher` on the same connection and
    /// returned as [CopyOutcome::LoadErrors]. Nothing is retried.
    pub async fn execute<C, F>(
        &self,
        connection: &mut C,
        fetcher: &F,
    ) -> Result<CopyOutcome, CopyError>
    where
        C: Executable,
        F: LoadErrorFetcher<C>,
    {
        let span = info_span!(
            "copy",
            table = %self.table_name,
            request_id = %uuid::Uuid::new_v4()
        );
        async move {
            debug!(statement = %self.redacted_statement(), "running COPY");
            let error = match connection.run(&self.statement()).await {
                Ok(_) => {
                    info!("COPY finished");
                    return Ok(CopyOutcome::Loaded);
                }
                Err(error) => error,
            };
            let rule = classifier::matching_rule(&error).map(|rule| rule.name);
            warn!(
                kind = ?error.kind(),
                rule = rule.unwrap_or("none"),
                message = error.message(),
                "COPY failed"
            );
            match classifier::classify(error) {
                Classification::FetchLoadErrors => {
                    match fetcher.fetch_load_errors(connection).await {
                        Ok(load_errors) => {
                            warn!(count = load_errors.len(), "COPY rejected rows");
                            Ok(CopyOutcome::LoadErrors(load_errors))
                        }
                        Err(error) => Err(CopyError::Database(error)),
                    }
                }
                Classification::Failure(error) => Err(error),
            }
        }
        .instrument(span)
        .await
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
