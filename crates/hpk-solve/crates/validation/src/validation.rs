// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use enum_dispatch::enum_dispatch;
use hpk_schema::foundation::Compatibility;
use hpk_solve_graph::State;
use hpk_solve_package_iterator::{Candidate, PackageFacts};

use crate::validators::{ConflictsValidator, DeprecationValidator, RequirementsValidator};

#[cfg(test)]
#[path = "./validation_test.rs"]
mod validation_test;

#[derive(Clone, Copy, Debug)]
#[enum_dispatch(ValidatorT)]
pub enum Validators {
    Conflicts(ConflictsValidator),
    Deprecation(DeprecationValidator),
    Requirements(RequirementsValidator),
}

/// For checking a candidate against the state it would be added to
#[enum_dispatch]
pub trait ValidatorT {
    /// Check if the given candidate is appropriate for the provided state data.
    fn validate_candidate(
        &self,
        state: &State,
        facts: &PackageFacts,
        candidate: &Candidate,
    ) -> crate::Result<Compatibility>;
}

/// The validators that every candidate must pass, in the order
/// that they are checked.
pub fn default_validators(allow_deprecated: bool) -> Vec<Validators> {
    let mut validators = vec![Validators::Requirements(RequirementsValidator {})];
    if !allow_deprecated {
        validators.push(Validators::Deprecation(DeprecationValidator {}));
    }
    validators.push(Validators::Conflicts(ConflictsValidator {}));
    validators
}
