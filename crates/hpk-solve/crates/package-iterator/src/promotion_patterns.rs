// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use glob::Pattern;

#[cfg(test)]
#[path = "./promotion_patterns_test.rs"]
mod promotion_patterns_test;

/// A list of glob patterns that can be used to match and reorder other lists.
///
/// Used for the configured preferences of compilers and providers,
/// where each entry may be a plain name or a pattern like `gcc*`.
#[derive(Clone, Debug, Default)]
pub struct PromotionPatterns(Vec<Pattern>);

impl PromotionPatterns {
    /// Parse a preference list, best first, into a list of patterns.
    pub fn new<I, S>(preferences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            preferences
                .into_iter()
                .filter_map(|p| Pattern::new(p.as_ref()).ok())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The index of the first pattern matching `name`, if any.
    pub fn rank(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|pattern| pattern.matches(name))
    }
}
