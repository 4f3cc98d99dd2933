//! Options a load is built from.
//!
//! Options usually come from several places (flags, environment, an options file),
//! so every field is optional until [ConnectionOptions] and [CopyCommand] are built.

use std::path::Path;

use serde::Deserialize;

use crate::{
    copy::{CopyCommand, Credentials},
    errors::ValidationError,
};

pub const DEFAULT_PORT: u16 = 5439;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Where and as whom to connect
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

/// Options as read from any one source, merged with [Options::merge]
#[derive(Deserialize, Clone, Default, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub redshift_endpoint: Option<String>,
    pub redshift_port: Option<u16>,
    pub database: Option<String>,
    pub redshift_username: Option<String>,
    pub redshift_password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub table: Option<String>,
    pub data_source: Option<String>,
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<String>,
    pub aws_token: Option<String>,
    /// Kept untyped so a malformed list is reported as a [ValidationError]
    pub column_list: Option<serde_json::Value>,
    pub copy_options: Option<String>,
}

impl Options {
    /// Read an options file, a JSON object keyed like the fields of [Options].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| OptionsError::Read {
            path: path.display().to_string(),
            error,
        })?;
        serde_json::from_str(&contents).map_err(|error| OptionsError::Parse {
            path: path.display().to_string(),
            error,
        })
    }
    /// Fields set in `other` win.
    pub fn merge(self, other: Options) -> Options {
        Options {
            redshift_endpoint: other.redshift_endpoint.or(self.redshift_endpoint),
            redshift_port: other.redshift_port.or(self.redshift_port),
            database: other.database.or(self.database),
            redshift_username: other.redshift_username.or(self.redshift_username),
            redshift_password: other.redshift_password.or(self.redshift_password),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
            table: other.table.or(self.table),
            data_source: other.data_source.or(self.data_source),
            aws_access_key: other.aws_access_key.or(self.aws_access_key),
            aws_secret_key: other.aws_secret_key.or(self.aws_secret_key),
            aws_token: other.aws_token.or(self.aws_token),
            column_list: other.column_list.or(self.column_list),
            copy_options: other.copy_options.or(self.copy_options),
        }
    }
    pub fn connection_options(&self) -> Result<ConnectionOptions, OptionsError> {
        Ok(ConnectionOptions {
            host: required(&self.redshift_endpoint, "redshift_endpoint")?,
            port: self.redshift_port.unwrap_or(DEFAULT_PORT),
            database: required(&self.database, "database")?,
            user: required(&self.redshift_username, "redshift_username")?,
            password: required(&self.redshift_password, "redshift_password")?,
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }
    pub fn copy_command(&self) -> Result<CopyCommand, OptionsError> {
        let mut credentials = Credentials::new(
            required(&self.aws_access_key, "aws_access_key")?,
            required(&self.aws_secret_key, "aws_secret_key")?,
        );
        if let Some(token) = &self.aws_token {
            credentials = credentials.with_session_token(token);
        }
        let mut command = CopyCommand::try_new(
            required(&self.table, "table")?,
            required(&self.data_source, "data_source")?,
            credentials,
        )?;
        if let Some(columns) = &self.column_list {
            command.set_columns_value(columns)?;
        }
        if let Some(copy_options) = &self.copy_options {
            command.set_options(copy_options);
        }
        Ok(command)
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, OptionsError> {
    value.clone().ok_or(OptionsError::Missing(name))
}

/// Error building a load from [Options]
#[derive(thiserror::Error, Debug)]
pub enum OptionsError {
    #[error("missing required option {0}")]
    Missing(&'static str),
    #[error("failed to read options file {path}: {error}")]
    Read { path: String, error: std::io::Error },
    #[error("failed to parse options file {path}: {error}")]
    Parse {
        path: String,
        error: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
