// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

#![deny(unsafe_op_in_unsafe_fn)]

mod error;
#[cfg(test)]
mod fixtures;
mod session;

pub use error::{Error, FormatError, Result};
pub use session::Session;
pub use {
    hpk_config as config,
    hpk_database as database,
    hpk_schema as schema,
    hpk_solve as solve,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
