// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::PathBuf;
use std::time::Duration;

use hpk_schema::DagHash;
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://hpk.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("hpk::generic"))
    )
)]
pub enum Error {
    #[error("Timed out after {timeout:?} waiting for the database lock {path}")]
    #[diagnostic(
        code(hpk::database::lock_timeout),
        help("another process may be holding the lock, or store.lock_timeout_seconds is too low")
    )]
    LockTimeout { path: PathBuf, timeout: Duration },
    #[error("Failed to lock {0}")]
    LockError(PathBuf, #[source] std::io::Error),
    #[error("Database index {0} is corrupt: {1}")]
    #[diagnostic(
        code(hpk::database::corrupt_index),
        help("rebuild the index from the installed prefixes with a reindex")
    )]
    CorruptIndex(PathBuf, String),
    #[error("Expected database version {expected} but found version {found}")]
    #[diagnostic(code(hpk::database::invalid_version))]
    InvalidDatabaseVersion { expected: u32, found: u32 },
    #[error("Invalid ref_count: {hash}: {found} (expected {expected})")]
    #[diagnostic(code(hpk::database::invalid_ref_count))]
    InvalidRefCount {
        hash: DagHash,
        found: u32,
        expected: u32,
    },
    #[error("No such spec in database: {0}")]
    #[diagnostic(code(hpk::database::no_such_record))]
    NoSuchRecord(String),
    #[error("Query '{query}' matches more than one spec: {}", .matches.join(", "))]
    #[diagnostic(code(hpk::database::ambiguous_query))]
    AmbiguousQuery { query: String, matches: Vec<String> },
    #[error("{0} is not installed")]
    #[diagnostic(code(hpk::database::not_installed))]
    NotInstalled(String),
    #[error("Cannot remove {spec}, it is still needed by: {}", .dependents.join(", "))]
    #[diagnostic(
        code(hpk::database::has_dependents),
        help("remove the dependents first")
    )]
    HasDependents {
        spec: String,
        dependents: Vec<String>,
    },
    #[error("Cannot deprecate {0} in favor of itself")]
    SelfDeprecation(String),
    #[error("Install prefix {0} does not hold the expected spec: {1}")]
    #[diagnostic(code(hpk::database::inconsistent_prefix))]
    InconsistentPrefix(PathBuf, String),
    #[error("Failed to create directory {0}")]
    DirectoryCreateError(PathBuf, #[source] std::io::Error),
    #[error("Failed to open file {0}")]
    FileOpenError(PathBuf, #[source] std::io::Error),
    #[error("Failed to read file {0}")]
    FileReadError(PathBuf, #[source] std::io::Error),
    #[error("Failed to write {0}: {1}")]
    StorageWriteError(&'static str, PathBuf, #[source] std::io::Error),
    #[error("Failed to read directory {0}")]
    ReadDirError(PathBuf, #[source] std::io::Error),
    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),
    #[error("Database cache lock poisoned")]
    CachePoisoned,
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Schema(#[from] hpk_schema::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Config(#[from] hpk_config::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Error: {0}")]
    String(String),
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::String(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::String(err.to_owned())
    }
}

impl Error {
    pub fn is_no_such_record(&self) -> bool {
        matches!(self, Self::NoSuchRecord(_))
    }
}
