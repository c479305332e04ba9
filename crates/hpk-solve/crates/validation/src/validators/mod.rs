// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod conflicts;
mod deprecation;
mod prelude;
mod requirements;

pub use conflicts::ConflictsValidator;
pub use deprecation::DeprecationValidator;
pub use requirements::RequirementsValidator;
