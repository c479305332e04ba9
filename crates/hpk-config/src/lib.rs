// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod config;
mod error;

pub use error::{Error, Result};

pub use self::config::*;
