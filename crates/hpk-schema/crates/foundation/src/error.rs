// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use miette::Diagnostic;
use thiserror::Error;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://hpk.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("hpk::generic"))
    )
)]
pub enum Error {
    #[error(transparent)]
    InvalidNameError(#[from] crate::name::InvalidNameError),
    #[error(transparent)]
    InvalidVersionError(#[from] crate::version::InvalidVersionError),
    #[error(transparent)]
    InvalidArchError(#[from] crate::arch::InvalidArchError),
    #[error("Failed to parse '{input}': {message}")]
    #[diagnostic(code(hpk::foundation::parse))]
    ParseError { input: String, message: String },
    #[error("{0}")]
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

pub type Result<T> = std::result::Result<T, Error>;
