// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

pub type Result<T> = std::result::Result<T, Error>;

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
    Solve(#[from] hpk_solve::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Database(#[from] hpk_database::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Schema(#[from] hpk_schema::Error),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Config(#[from] hpk_config::Error),
    #[error("No installed spec matches '{0}'")]
    #[diagnostic(
        code(hpk::no_match),
        help("installed specs can be listed with an empty query")
    )]
    NoMatch(String),
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

/// Render an error for a person to read, with more detail at
/// higher verbosity.
pub trait FormatError {
    fn format_error(&self, verbosity: u32) -> String;
}

impl FormatError for hpk_solve::Error {
    fn format_error(&self, verbosity: u32) -> String {
        let mut msg = String::new();
        match self {
            // the explanation already carries its own heading
            hpk_solve::Error::Unsatisfiable(err) => msg.push_str(&err.explanation),
            hpk_solve::Error::SolverInterrupted(err) => {
                msg.push_str("Failed to concretize\n * ");
                msg.push_str(err);
            }
            err => {
                msg.push_str("Failed to concretize\n * ");
                msg.push_str(&err.to_string());
            }
        }
        push_help(&mut msg, self, verbosity);
        msg
    }
}

impl FormatError for hpk_database::Error {
    fn format_error(&self, verbosity: u32) -> String {
        let mut msg = format!("Database error\n * {self}");
        if verbosity > 1 {
            let mut source = std::error::Error::source(self);
            while let Some(err) = source {
                msg.push_str("\n   caused by: ");
                msg.push_str(&err.to_string());
                source = err.source();
            }
        }
        push_help(&mut msg, self, verbosity);
        msg
    }
}

impl FormatError for Error {
    fn format_error(&self, verbosity: u32) -> String {
        match self {
            Error::Solve(err) => err.format_error(verbosity),
            Error::Database(err) => err.format_error(verbosity),
            err => {
                let mut msg = err.to_string();
                push_help(&mut msg, err, verbosity);
                msg
            }
        }
    }
}

fn push_help(msg: &mut String, err: &dyn Diagnostic, verbosity: u32) {
    match verbosity {
        0 => msg.push_str("\n * try raising the verbosity for more info"),
        _ => {
            if let Some(help) = err.help() {
                msg.push_str("\n * help: ");
                msg.push_str(&help.to_string());
            }
        }
    }
}
