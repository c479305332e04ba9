// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

mod error;
mod facts;
mod package_iterator;
mod promotion_patterns;

pub use error::{Error, Result};
pub use facts::{ExternalFact, PackageFacts};
pub use package_iterator::{
    BUILD_SORT_TARGET,
    BuildCandidate,
    BuildIterator,
    Candidate,
    PackageIterator,
    external_candidates,
    ordered_versions,
};
pub use promotion_patterns::PromotionPatterns;
