// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_schema::foundation::{pkg_name, variant_name};
use hpk_schema::{NodeSpec, Spec, spec};
use hpk_solve_graph::{Conflict, ConflictKind, Origin, Requirement};
use rstest::rstest;

use super::explain;

fn explicit(request: &str) -> Arc<Origin> {
    Arc::new(Origin::Explicit {
        request: spec!(request),
    })
}

fn depends_on(parent: &str, dependency: &str, when: Option<&str>, because: Arc<Origin>) -> Arc<Origin> {
    Arc::new(Origin::DependsOn {
        parent: parent.parse().unwrap(),
        dependency: spec!(dependency),
        when: when.map(|w| spec!(w)),
        because: vec![because],
    })
}

fn requirement(constraint: &str, origin: Arc<Origin>) -> Requirement {
    let node: Spec = spec!(constraint);
    Requirement::new(node.root().clone(), origin).unwrap()
}

#[rstest]
fn test_version_conflict_chain() {
    let request = explicit("quantum-espresso ^fftw@1.1:");
    let conflict = Conflict::new(
        ConflictKind::Versions {
            name: pkg_name!("fftw"),
            requirements: vec![
                requirement("fftw@1.1:", Arc::clone(&request)),
                requirement(
                    "fftw@:1.0",
                    depends_on("quantum-espresso", "fftw@:1.0", None, Arc::clone(&request)),
                ),
            ],
        },
        [],
    );
    let err = explain(&[conflict]);
    assert_eq!(
        err.explanation,
        "\
concretization failed for the following reasons:

   1. Cannot satisfy 'fftw@:1.0' and 'fftw@1.1:'
        required because quantum-espresso depends on fftw@:1.0
          required because quantum-espresso ^fftw@1.1: requested explicitly
        required because quantum-espresso ^fftw@1.1: requested explicitly"
    );
    assert_eq!(err.reasons.len(), 1);
}

#[rstest]
fn test_variant_conflict_lists_values() {
    let request = explicit("quantum-espresso+invino ^fftw~mpi");
    let conflict = Conflict::new(
        ConflictKind::Variant {
            name: pkg_name!("fftw"),
            variant: variant_name!("mpi"),
            requirements: vec![
                requirement("fftw~mpi", Arc::clone(&request)),
                requirement(
                    "fftw+mpi",
                    depends_on("quantum-espresso", "fftw+mpi", Some("+invino"), request),
                ),
            ],
        },
        [],
    );
    let reason = &explain(&[conflict]).reasons[0];
    let mut lines = reason.lines();
    assert_eq!(
        lines.next(),
        Some("'fftw' required multiple values for single-valued variant 'mpi'")
    );
    assert_eq!(lines.next(), Some("        Requested '~mpi' and '+mpi'"));
    assert_eq!(
        lines.next(),
        Some("        required because quantum-espresso depends on fftw+mpi when +invino")
    );
}

#[rstest]
fn test_not_buildable_lists_externals() {
    let request = explicit("quantum-espresso+veritas");
    let external: Spec = spec!("quantum-espresso~veritas");
    let conflict = Conflict::new(
        ConflictKind::NotBuildable {
            name: pkg_name!("quantum-espresso"),
            externals: vec![external.root().clone()],
            requirements: vec![requirement("quantum-espresso+veritas", request)],
        },
        [],
    );
    let reason = &explain(&[conflict]).reasons[0];
    assert_eq!(
        reason,
        "\
Attempted to build package quantum-espresso which is not buildable and does not have a satisfying external
        'quantum-espresso~veritas' is an external constraint for quantum-espresso which was not satisfied
        'quantum-espresso+veritas' required
        required because quantum-espresso+veritas requested explicitly"
    );
}

#[rstest]
fn test_duplicate_reasons_are_numbered_once() {
    let no_version = || {
        Conflict::new(
            ConflictKind::NoVersion {
                name: pkg_name!("libelf"),
                requirements: vec![requirement("libelf@2:", explicit("libelf@2:"))],
            },
            [],
        )
    };
    let no_compiler = Conflict::new(
        ConflictKind::NoCompiler {
            name: pkg_name!("libdwarf"),
            requirements: vec![requirement("libdwarf%intel", explicit("libdwarf%intel"))],
        },
        [],
    );
    let err = explain(&[no_version(), no_compiler, no_version()]);
    assert_eq!(err.reasons.len(), 2);
    assert!(err.explanation.contains("\n   1. No version of libelf satisfies 'libelf@2:'"));
    assert!(
        err.explanation
            .contains("\n   2. No available compiler for 'libdwarf %intel'")
    );
}

#[rstest]
fn test_incompatible_lists_every_constraint() {
    let conflict = Conflict::new(
        ConflictKind::Incompatible {
            name: pkg_name!("libelf"),
            requirements: vec![
                requirement("libelf%gcc", explicit("libelf%gcc")),
                requirement("libelf%clang", explicit("libdwarf ^libelf%clang")),
                requirement("libelf%intel", explicit("libdwarf ^libelf%intel")),
            ],
        },
        [],
    );
    let reason = &explain(&[conflict]).reasons[0];
    assert!(
        reason.starts_with("Cannot satisfy 'libelf %gcc', 'libelf %clang' and 'libelf %intel'"),
        "{reason}"
    );
    let node: NodeSpec = spec!("libelf%gcc").root().clone();
    assert_eq!(node.to_string(), "libelf %gcc");
}
