// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

pub mod arch;
mod compat;
pub mod compiler;
mod error;
pub mod name;
pub mod variant;
pub mod version;
pub mod version_range;

pub use compat::Compatibility;
pub use error::{Error, Result};
