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
    #[error("Cannot load config, lock has been poisoned: {0}")]
    LockPoisonedRead(String),
    #[error("Cannot update config, lock has been poisoned: {0}")]
    LockPoisonedWrite(String),

    #[error(transparent)]
    #[diagnostic(
        code(hpk::config::invalid),
        help("check /etc/hpk, ~/.config/hpk/hpk and any HPK_* environment variables")
    )]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
