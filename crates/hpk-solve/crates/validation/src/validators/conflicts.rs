// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use super::prelude::*;
use crate::ValidatorT;

/// Ensures that none of the package's declared conflicts apply to a candidate.
///
/// Conflicts that mention other packages can only be checked once
/// those are resolved, and are skipped here.
#[derive(Clone, Copy, Debug)]
pub struct ConflictsValidator {}

impl ValidatorT for ConflictsValidator {
    fn validate_candidate(
        &self,
        _state: &State,
        facts: &PackageFacts,
        candidate: &Candidate,
    ) -> crate::Result<Compatibility> {
        let attrs = candidate.attrs();
        for conflict in facts.package.conflicts.iter() {
            let mentions_dependencies = !conflict.spec.dependencies().is_empty()
                || conflict
                    .when
                    .as_ref()
                    .is_some_and(|w| !w.dependencies().is_empty());
            if mentions_dependencies {
                continue;
            }
            let applies = conflict.spec.root().is_satisfied_by(attrs)
                && conflict
                    .when
                    .as_ref()
                    .is_none_or(|w| w.root().is_satisfied_by(attrs));
            if applies {
                let message = match &conflict.msg {
                    Some(msg) => msg.clone(),
                    None => format!("conflicts with '{}'", conflict.spec),
                };
                return Ok(Compatibility::incompatible(message));
            }
        }
        Ok(Compatibility::Compatible)
    }
}
