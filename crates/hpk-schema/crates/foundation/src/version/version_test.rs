// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use rstest::rstest;

use super::{Version, parse_version};

fn v(s: &str) -> Version {
    parse_version(s).unwrap()
}

#[rstest]
#[case("1.0", "1.0.0")]
#[case("1.9", "1.10")]
#[case("2.0rc1", "2.0.1")]
#[case("1.2a", "1.2.0")]
#[case("9999", "develop")]
#[case("master", "main")]
#[case("main", "develop")]
#[case("stable", "trunk")]
#[case("0.8.12", "0.8.13")]
fn test_version_ordering(#[case] lesser: &str, #[case] greater: &str) {
    assert!(
        v(lesser) < v(greater),
        "expected {lesser} < {greater}"
    );
}

#[rstest]
fn test_version_equality_is_by_parts() {
    assert_ne!(v("1.0"), v("1.0.0"));
    assert_eq!(v("1.0-1"), v("1.0.1"));
    assert_eq!(v("1.0-1").to_string(), "1.0-1");
}

#[rstest]
#[case("")]
#[case("1..0")]
#[case("1.0.")]
#[case("1.0+foo")]
#[case(".1")]
fn test_invalid_versions(#[case] source: &str) {
    assert!(parse_version(source).is_err(), "{source:?} should not parse");
}

#[rstest]
fn test_version_prefix() {
    assert!(v("1.2").is_prefix_of(&v("1.2.3")));
    assert!(v("1.2").is_prefix_of(&v("1.2")));
    assert!(!v("1.2.3").is_prefix_of(&v("1.2")));
    assert!(!v("1.2").is_prefix_of(&v("1.20")));
    assert_eq!(v("1.2.3").up_to(2), v("1.2"));
}

#[rstest]
fn test_version_from_yaml_number() {
    let version: Version = serde_json::from_str("3").unwrap();
    assert_eq!(version, v("3"));
}
