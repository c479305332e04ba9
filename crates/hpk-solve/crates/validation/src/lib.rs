// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod error;
mod validation;
pub mod validators;

pub use error::{Error, Result};
pub use validation::{ValidatorT, Validators, default_validators};
