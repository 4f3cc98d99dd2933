use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use redshift_copy::{
    CopyCommand, CopyError, CopyOutcome, LoadError, Options, RedshiftConnection, StlLoadErrors,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SUCCESS: u8 = 0;
/// Every failure, classified or not
const FAILURE: u8 = 1;

/// Load data from S3 into a Redshift table with COPY
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Table to load into
    table: Option<String>,
    /// S3 location to load from, e.g. s3://bucket/prefix
    data_source: Option<String>,

    #[arg(long, env = "REDSHIFT_HOST")]
    host: Option<String>,
    #[arg(long, env = "REDSHIFT_PORT")]
    port: Option<u16>,
    #[arg(long, env = "REDSHIFT_DATABASE")]
    database: Option<String>,
    #[arg(long, env = "REDSHIFT_USER")]
    user: Option<String>,
    #[arg(long, env = "REDSHIFT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Seconds to wait for a connection
    #[arg(long, env = "REDSHIFT_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    aws_access_key: Option<String>,
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    aws_secret_key: Option<String>,
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    aws_token: Option<String>,

    /// Columns to load, in the order they appear in the source
    #[arg(long, num_args = 1..)]
    column_list: Option<Vec<String>>,
    /// Raw COPY options appended to the statement, e.g. "CSV IGNOREHEADER 1"
    #[arg(long)]
    copy_options: Option<String>,

    /// JSON file with default options, overridden by flags
    #[arg(long)]
    options_file: Option<PathBuf>,
    /// Print rejected rows as JSON
    #[arg(long)]
    json: bool,
    /// Log as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn options(&self) -> Result<Options> {
        let file = match &self.options_file {
            Some(path) => Options::from_file(path)?,
            None => Options::default(),
        };
        let flags = Options {
            redshift_endpoint: self.host.clone(),
            redshift_port: self.port,
            database: self.database.clone(),
            redshift_username: self.user.clone(),
            redshift_password: self.password.clone(),
            connect_timeout_secs: self.connect_timeout,
            table: self.table.clone(),
            data_source: self.data_source.clone(),
            aws_access_key: self.aws_access_key.clone(),
            aws_secret_key: self.aws_secret_key.clone(),
            aws_token: self.aws_token.clone(),
            column_list: self.column_list.clone().map(Into::into),
            copy_options: self.copy_options.clone(),
        };
        Ok(file.merge(flags))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            error!("{error:#}");
            ExitCode::from(FAILURE)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let options = cli.options()?;
    let connection_options = options.connection_options()?;
    let command = options.copy_command()?;

    let mut connection = RedshiftConnection::connect(&connection_options).await?;
    let result = command.execute(&mut connection, &StlLoadErrors).await;
    if let Err(error) = connection.close().await {
        warn!(%error, "failed to close connection");
    }
    report(&command, result, cli.json)
}

fn report(
    command: &CopyCommand,
    result: Result<CopyOutcome, CopyError>,
    json: bool,
) -> Result<u8> {
    match result {
        Ok(CopyOutcome::Loaded) => {
            info!(table = command.table_name(), "load complete");
            Ok(SUCCESS)
        }
        Ok(CopyOutcome::LoadErrors(load_errors)) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&load_errors)?);
            } else {
                print_load_errors(&load_errors);
            }
            Ok(FAILURE)
        }
        Err(error @ CopyError::Database(_)) => {
            Err(error).with_context(|| format!("COPY into {} failed", command.table_name()))
        }
        Err(error) => {
            eprintln!("{error}");
            Ok(FAILURE)
        }
    }
}

fn print_load_errors(load_errors: &[LoadError]) {
    if load_errors.is_empty() {
        println!("The load failed but no rejected rows were recorded for it.");
        return;
    }
    for load_error in load_errors {
        println!(
            "{}:{} column {} ({}, length {}) at position {}: {} [{}]",
            load_error.filename,
            load_error.line_number,
            load_error.colname,
            load_error.data_type,
            load_error.col_length,
            load_error.position,
            load_error.err_reason,
            load_error.err_code,
        );
        println!("  value: {}", load_error.raw_field_value);
        println!("  line:  {}", load_error.raw_line);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_options_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!(
            "redshift-copy-options-{}.json",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path)?;
        write!(
            file,
            r#"{{"table": "FROM_FILE", "data_source": "s3://b/k", "copy_options": "CSV", "column_list": ["a"]}}"#
        )?;

        let cli = Cli::try_parse_from([
            "redshift-copy",
            "FROM_FLAGS",
            "--options-file",
            path.to_str().context("temp path is not utf-8")?,
            "--aws-access-key",
            "AK",
            "--aws-secret-key",
            "SK",
            "--column-list",
            "c1",
            "c2",
        ])?;
        let command = cli.options()?.copy_command()?;
        std::fs::remove_file(&path)?;

        assert_eq!(command.table_name(), "FROM_FLAGS");
        assert_eq!(command.data_source(), "s3://b/k");
        assert_eq!(command.columns(), ["c1", "c2"]);
        assert_eq!(command.options(), "CSV");
        Ok(())
    }

    #[test]
    fn classified_errors_exit_with_failure() -> Result<()> {
        let cli = Cli::try_parse_from(["redshift-copy", "T", "s3://b/k"])?;
        let command = CopyCommand::try_new(
            cli.table.clone().context("table")?,
            "s3://b/k",
            redshift_copy::Credentials::new("AK", "SK"),
        )?;
        let code = report(
            &command,
            Err(CopyError::DataSource("missing".into())),
            false,
        )?;
        assert_eq!(code, FAILURE);
        assert_eq!(
            report(&command, Ok(CopyOutcome::Loaded), false)?,
            SUCCESS
        );
        Ok(())
    }
}
