// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use super::prelude::*;
use crate::ValidatorT;

/// Ensures that a candidate meets every requirement on its package.
#[derive(Clone, Copy, Debug)]
pub struct RequirementsValidator {}

impl ValidatorT for RequirementsValidator {
    fn validate_candidate(
        &self,
        state: &State,
        _facts: &PackageFacts,
        candidate: &Candidate,
    ) -> crate::Result<Compatibility> {
        let attrs = candidate.attrs();
        for requirement in state.requirements(attrs.node_name()) {
            if !requirement.constraint.is_satisfied_by(attrs) {
                return Ok(Compatibility::incompatible(format!(
                    "does not satisfy '{}'",
                    requirement.constraint
                )));
            }
        }
        Ok(Compatibility::Compatible)
    }
}
