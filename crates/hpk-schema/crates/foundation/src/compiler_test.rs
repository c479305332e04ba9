// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use rstest::rstest;

use super::{CompilerConstraint, CompilerSpec};

#[rstest]
#[case("gcc@=10.2.1", "gcc@10.2.1")]
#[case("gcc@10.2.1", "gcc@10.2.1")]
#[case("clang@15.0.0", "clang@15.0.0")]
fn test_compiler_spec_parse(#[case] source: &str, #[case] display: &str) {
    let spec: CompilerSpec = source.parse().unwrap();
    assert_eq!(spec.to_string(), display);
}

#[rstest]
#[case("gcc")]
#[case("gcc@9:")]
fn test_compiler_spec_requires_version(#[case] source: &str) {
    assert!(source.parse::<CompilerSpec>().is_err());
}

#[rstest]
#[case("gcc", "gcc@10.2.1", true)]
#[case("gcc@10.2", "gcc@10.2.1", true)]
#[case("gcc@=10.2", "gcc@10.2.1", false)]
#[case("gcc@11:", "gcc@10.2.1", false)]
#[case("clang", "gcc@10.2.1", false)]
fn test_constraint_satisfied_by(#[case] constraint: &str, #[case] spec: &str, #[case] expected: bool) {
    let constraint: CompilerConstraint = constraint.parse().unwrap();
    let spec: CompilerSpec = spec.parse().unwrap();
    assert_eq!(constraint.is_satisfied_by(&spec), expected);
}

#[rstest]
fn test_constraint_display_round_trip() {
    let constraint: CompilerConstraint = "gcc@=13.2.0".parse().unwrap();
    assert_eq!(constraint.to_string(), "gcc@=13.2.0");
    let constraint: CompilerConstraint = "gcc".parse().unwrap();
    assert_eq!(constraint.to_string(), "gcc");
}
