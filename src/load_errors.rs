use std::future::Future;

use serde::Serialize;

use crate::{connection::RedshiftConnection, errors::DatabaseError};

/// Rows of `stl_load_errors` for the last `COPY` run on the session
pub const STL_LOAD_ERRORS_QUERY: &str = "SELECT line_number, TRIM(colname) AS colname, TRIM(type) AS data_type, TRIM(col_length) AS col_length, position, TRIM(raw_line) AS raw_line, TRIM(raw_field_value) AS raw_field_value, err_code, TRIM(err_reason) AS err_reason, TRIM(filename) AS filename FROM stl_load_errors WHERE query = pg_last_copy_id() ORDER BY line_number, position";

/// A row rejected by a `COPY`, as recorded in
/// [STL_LOAD_ERRORS](https://docs.aws.amazon.com/redshift/latest/dg/r_STL_LOAD_ERRORS.html)
#[derive(sqlx::FromRow, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct LoadError {
    pub line_number: i64,
    pub colname: String,
    pub data_type: String,
    pub col_length: String,
    pub position: i32,
    pub raw_line: String,
    pub raw_field_value: String,
    pub err_code: i32,
    pub err_reason: String,
    pub filename: String,
}

/// Looks up why rows of a failed `COPY` were rejected, using the connection the
/// `COPY` ran on.
pub trait LoadErrorFetcher<C> {
    fn fetch_load_errors(
        &self,
        connection: &mut C,
    ) -> impl Future<Output = Result<Vec<LoadError>, DatabaseError>>;
}

/// Reads `stl_load_errors` through [STL_LOAD_ERRORS_QUERY]
#[derive(Clone, Copy, Default, Debug)]
pub struct StlLoadErrors;

impl LoadErrorFetcher<RedshiftConnection> for StlLoadErrors {
    async fn fetch_load_errors(
        &self,
        connection: &mut RedshiftConnection,
    ) -> Result<Vec<LoadError>, DatabaseError> {
        let load_errors = sqlx::query_as::<_, LoadError>(STL_LOAD_ERRORS_QUERY)
            .fetch_all(connection.as_mut())
            .await?;
        Ok(load_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_json() -> Result<(), anyhow::Error> {
        let load_error = LoadError {
            line_number: 1,
            colname: "id".into(),
            data_type: "int4".into(),
            col_length: "0".into(),
            position: 0,
            raw_line: "x,y".into(),
            raw_field_value: "x".into(),
            err_code: 1207,
            err_reason: "Invalid digit, Value 'x', Pos 0, Type: Integer".into(),
            filename: "s3://bucket/key.csv".into(),
        };
        let value = serde_json::to_value(&load_error)?;
        assert_eq!(value["line_number"], 1);
        assert_eq!(value["err_code"], 1207);
        assert_eq!(value["filename"], "s3://bucket/key.csv");
        Ok(())
    }

    fn assert_fetcher<F: LoadErrorFetcher<RedshiftConnection>>(_: &F) {}

    #[test]
    fn stl_load_errors_fetches_on_redshift() {
        assert_fetcher(&StlLoadErrors);
    }

    #[test]
    fn query_targets_last_copy() {
        assert!(STL_LOAD_ERRORS_QUERY.contains("FROM stl_load_errors"));
        assert!(STL_LOAD_ERRORS_QUERY.contains("query = pg_last_copy_id()"));
    }
}
