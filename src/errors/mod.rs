use std::path::PathBuf;
use thiserror::Error;

pub use aws_sdk_dynamodb::error::BuildError;

/// Error returned by a [`StoreClient`](crate::store::StoreClient) operation.
///
/// Anything other than [`StoreError::Timeout`] is a hard failure from the
/// store (validation, permissions, connectivity) and is never retried.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("AwsError: {0}")]
    Aws(String),
    #[error("AwsBuildError: {0}")]
    AwsBuildError(#[from] BuildError),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Error returned before any worker starts: bad table, bad file list.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("table '{0}' does not exist")]
    TableNotFound(String),
    #[error("no input files given")]
    NoInputFiles,
    #[error("input files not found: {0}")]
    MissingFiles(String),
    #[error("StoreError: {0}")]
    Store(#[from] StoreError),
}

/// Error returned by a dump worker while scanning a partition to a file.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("StoreError: {0}")]
    Store(#[from] StoreError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("EncodeError: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error returned by a load worker while replaying a dump file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("StoreError: {0}")]
    Store(#[from] StoreError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("DecodeError in {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{remaining} items still unprocessed after {attempts} batch-write attempts")]
    UnprocessedRetriesExhausted { attempts: u32, remaining: usize },
}

/// Error abstracting all errors returned by `ddb-mover`.
///
/// Worker variants carry the unit (segment, key or file) whose worker
/// failed, so a run that aborts can say which part of the table or which
/// input file was responsible.
#[derive(Error, Debug)]
pub enum Error {
    #[error("SetupError: {0}")]
    Setup(#[from] SetupError),
    #[error("dump worker for {unit} failed: {source}")]
    DumpWorker { unit: String, source: DumpError },
    #[error("load worker for {unit} failed: {source}")]
    LoadWorker { unit: String, source: LoadError },
    #[error("worker for {unit} panicked")]
    WorkerPanic { unit: String },
}
