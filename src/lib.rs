//! Run Redshift `COPY` statements and tell their failures apart.
//!
//! A [CopyCommand] renders the statement, [CopyCommand::execute] runs it on anything
//! [Executable] and sorts a failure into a [CopyError], or into
//! [CopyOutcome::LoadErrors] when rows were rejected.

pub mod classifier;
pub mod connection;
pub mod copy;
pub mod errors;
pub mod load_errors;
pub mod options;

pub use connection::{ConnectError, Executable, RedshiftConnection};
pub use copy::{CopyCommand, CopyOutcome, Credentials};
pub use errors::{CopyError, DatabaseError, DatabaseErrorKind, ValidationError};
pub use load_errors::{LoadError, LoadErrorFetcher, StlLoadErrors};
pub use options::{ConnectionOptions, Options, OptionsError};
