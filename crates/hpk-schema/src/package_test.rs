// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;

use rstest::rstest;

use super::{Package, VariantKind};
use crate::foundation::variant::VariantValue;
use crate::{BuildSystemT, DepType, Error};

static FFTW: &str = r#"
name: fftw
build_system: autotools
versions:
  - version: "1.0"
  - version: "0.9"
    deprecated: true
variants:
  - name: mpi
    default: true
    description: Enable distributed memory parallelism
  - name: precision
    kind: multi
    values: [float, double, long_double]
    default: [float, double]
depends_on:
  - spec: mpi
    when: +mpi
conflicts:
  - spec: "%clang"
    when: precision=long_double
    msg: long double is not supported by clang
"#;

#[rstest]
fn test_package_from_yaml() {
    let package = Package::from_yaml(FFTW).unwrap();
    assert_eq!(package.name, "fftw");
    assert_eq!(package.build_system.name(), "autotools");
    assert_eq!(package.versions.len(), 2);
    assert!(package.versions[1].deprecated);

    let dep = &package.depends_on[0];
    assert_eq!(dep.name(), "mpi");
    assert_eq!(dep.types, DepType::defaults());
    assert_eq!(dep.when.as_ref().unwrap().to_string(), "+mpi");

    let precision = package.variant("precision").unwrap();
    assert_eq!(precision.kind(), VariantKind::Multi);
    assert_eq!(
        precision.default_value(),
        VariantValue::Multi(BTreeSet::from(["double".into(), "float".into()]))
    );
    assert_eq!(package.variant("mpi").unwrap().kind(), VariantKind::Bool);
}

#[rstest]
fn test_package_yaml_round_trip() {
    let package = Package::from_yaml(FFTW).unwrap();
    let yaml = serde_yaml::to_string(&package).unwrap();
    assert_eq!(Package::from_yaml(yaml).unwrap(), package);
}

#[rstest]
#[case("mpi=true", "+mpi")]
#[case("mpi=False", "~mpi")]
#[case("precision=float", "precision=float")]
#[case("precision=double,float", "precision=double,float")]
fn test_normalize_node(#[case] source: &str, #[case] expected: &str) {
    let package = Package::from_yaml(FFTW).unwrap();
    let node = crate::spec!(source);
    let normalized = package.normalize_node(node.root()).unwrap();
    assert_eq!(normalized.to_string(), expected);
}

#[rstest]
fn test_normalize_rejects_unknown_variants() {
    let package = Package::from_yaml(FFTW).unwrap();
    let err = package.normalize_node(crate::spec!("+openmp").root()).unwrap_err();
    assert!(matches!(err, Error::UnknownVariant { .. }), "{err}");
    let err = package
        .normalize_node(crate::spec!("precision=half").root())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidVariantValue { .. }), "{err}");
    let err = package.normalize_node(crate::spec!("mpi=yes").root()).unwrap_err();
    assert!(matches!(err, Error::InvalidVariantValue { .. }), "{err}");
}

#[rstest]
fn test_single_valued_candidates() {
    let package = crate::package!({
        "name": "hdf5",
        "versions": [{"version": "1.14.3"}],
        "variants": [
            {"name": "api", "values": ["default", "v18", "v110"], "default": "v18"},
            {"name": "shared", "default": true},
        ],
    });
    let api = package.variant("api").unwrap();
    assert_eq!(api.kind(), VariantKind::Single);
    assert_eq!(
        api.candidates(),
        vec![
            VariantValue::Single("v18".into()),
            VariantValue::Single("default".into()),
            VariantValue::Single("v110".into()),
        ]
    );
    assert_eq!(
        package.variant("shared").unwrap().candidates(),
        vec![VariantValue::Bool(true), VariantValue::Bool(false)]
    );
}

#[rstest]
#[case::duplicate_version(r#"{"name": "a", "versions": [{"version": "1.0"}, {"version": "1.0"}]}"#)]
#[case::duplicate_variant(
    r#"{"name": "a", "variants": [{"name": "x"}, {"name": "x"}]}"#
)]
#[case::reserved_variant(r#"{"name": "a", "variants": [{"name": "target"}]}"#)]
#[case::bad_default(
    r#"{"name": "a", "variants": [{"name": "x", "values": ["b", "c"], "default": "d"}]}"#
)]
#[case::anonymous_dependency(r#"{"name": "a", "depends_on": [{"spec": "+x"}]}"#)]
#[case::self_dependency(r#"{"name": "a", "depends_on": [{"spec": "a"}]}"#)]
#[case::foreign_condition(r#"{"name": "a", "depends_on": [{"spec": "b", "when": "c+x"}]}"#)]
fn test_invalid_packages(#[case] source: &str) {
    let result = serde_json::from_str::<Package>(source)
        .map_err(Error::from)
        .and_then(|package| package.validate());
    assert!(result.is_err());
}
