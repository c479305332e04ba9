// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use super::prelude::*;
use crate::ValidatorT;

/// Ensures that deprecated versions are not built unless specifically requested.
///
/// Installed and external candidates are already present on the
/// system, so they are not held to this.
#[derive(Clone, Copy, Debug)]
pub struct DeprecationValidator {}

impl ValidatorT for DeprecationValidator {
    fn validate_candidate(
        &self,
        state: &State,
        facts: &PackageFacts,
        candidate: &Candidate,
    ) -> crate::Result<Compatibility> {
        let Candidate::Build(node) = candidate else {
            return Ok(Compatibility::Compatible);
        };
        let deprecated = facts
            .package
            .version(&node.version)
            .is_some_and(|def| def.deprecated);
        if !deprecated {
            return Ok(Compatibility::Compatible);
        }
        let pinned = state
            .requirements(&node.name)
            .iter()
            .any(|r| r.constraint.versions.pins(&node.version));
        if pinned {
            return Ok(Compatibility::Compatible);
        }
        Ok(Compatibility::incompatible(
            "version is deprecated (and not requested exactly)",
        ))
    }
}
