// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

pub(crate) use hpk_schema::foundation::Compatibility;
pub(crate) use hpk_solve_graph::State;
pub(crate) use hpk_solve_package_iterator::{Candidate, PackageFacts};
