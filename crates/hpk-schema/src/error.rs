// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::{DagHash, PkgName, VariantName};

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://hpk.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("hpk::generic"))
    )
)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Foundation(#[from] hpk_schema_foundation::Error),
    #[error("Package not found: {0}")]
    #[diagnostic(
        code(hpk::schema::package_not_found),
        help("check the package name and the configured repositories")
    )]
    PackageNotFound(PkgName),
    #[error("Invalid package file {0}")]
    InvalidPackageFile(PathBuf, #[source] serde_yaml::Error),
    #[error("Invalid package {0}: {1}")]
    InvalidPackage(PkgName, String),
    #[error("Package {package} has no variant named '{variant}'")]
    #[diagnostic(code(hpk::schema::unknown_variant))]
    UnknownVariant {
        package: PkgName,
        variant: VariantName,
    },
    #[error("Invalid value '{value}' for variant '{variant}' of {package}: {message}")]
    #[diagnostic(code(hpk::schema::invalid_variant_value))]
    InvalidVariantValue {
        package: PkgName,
        variant: VariantName,
        value: String,
        message: String,
    },
    #[error("Invalid spec '{spec}': {message}")]
    #[diagnostic(code(hpk::schema::invalid_spec))]
    InvalidSpec { spec: String, message: String },
    #[error("Spec for {name} was recorded with hash {recorded} but hashes to {computed}")]
    HashMismatch {
        name: PkgName,
        recorded: DagHash,
        computed: DagHash,
    },
    #[error("Spec node list does not contain {0}")]
    MissingNode(DagHash),
    #[error("Failed to open file {0}")]
    FileOpenError(PathBuf, #[source] io::Error),
    #[error("Failed to read directory {0}")]
    ReadDirError(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    String(String),
}

impl Error {
    pub fn is_package_not_found(&self) -> bool {
        matches!(self, Error::PackageNotFound(_))
    }
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

pub type Result<T> = std::result::Result<T, Error>;
