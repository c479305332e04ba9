// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

/// Denotes whether or not something is compatible.
#[must_use = "this `Compatibility` may be an `Incompatible` variant, which should be handled"]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Compatibility {
    Compatible,
    Incompatible(String),
}

impl std::fmt::Display for Compatibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compatibility::Compatible => f.write_str(""),
            Compatibility::Incompatible(msg) => f.write_str(msg),
        }
    }
}

impl Compatibility {
    pub fn incompatible(message: impl ToString) -> Self {
        Compatibility::Incompatible(message.to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }

    /// Keep the first incompatibility, if any.
    pub fn and(self, other: impl FnOnce() -> Compatibility) -> Compatibility {
        match self {
            Compatibility::Compatible => other(),
            incompatible => incompatible,
        }
    }
}
