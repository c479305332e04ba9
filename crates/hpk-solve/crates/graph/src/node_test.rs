// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_schema::foundation::arch::Arch;
use hpk_schema::foundation::variant::VariantValue;
use hpk_schema::foundation::variant_map;
use rstest::rstest;

use super::{NodeSource, Origin, ResolvedNode};

fn fftw() -> ResolvedNode {
    ResolvedNode {
        name: "fftw".parse().unwrap(),
        version: "1.0".parse().unwrap(),
        variants: variant_map! {
            "mpi" => VariantValue::Bool(true),
            "precision" => VariantValue::Multi(["double".into(), "float".into()].into()),
        },
        compiler: "gcc@10.2.1".parse().unwrap(),
        arch: Arch::new("linux", "ubuntu22.04", "x86_64"),
        source: NodeSource::Build,
    }
}

#[rstest]
#[case("fftw", true)]
#[case("fftw@:1.0+mpi", true)]
#[case("@1.0 precision=float", true)]
#[case("%gcc@10:", true)]
#[case("arch=linux-ubuntu22.04-x86_64", true)]
#[case("fftw~mpi", false)]
#[case("fftw@1.1:", false)]
#[case("fftw+openmp", false)]
#[case("%clang", false)]
#[case("zlib", false)]
fn test_resolved_node_satisfies(#[case] constraint: &str, #[case] expected: bool) {
    assert_eq!(fftw().satisfies(hpk_schema::spec!(constraint).root()), expected);
}

#[rstest]
fn test_resolved_node_display() {
    assert_eq!(
        fftw().to_string(),
        "fftw@1.0+mpi precision=double,float %gcc@10.2.1 arch=linux-ubuntu22.04-x86_64"
    );
    assert!(fftw().satisfies(&fftw().to_node_spec()));
}

#[rstest]
fn test_origin_display() {
    let explicit = Arc::new(Origin::Explicit {
        request: hpk_schema::spec!("quantum-espresso+invino ^fftw~mpi"),
    });
    assert_eq!(
        explicit.to_string(),
        "quantum-espresso+invino ^fftw~mpi requested explicitly"
    );
    let depends = Origin::DependsOn {
        parent: "quantum-espresso".parse().unwrap(),
        dependency: hpk_schema::spec!("fftw+mpi"),
        when: Some(hpk_schema::spec!("+invino")),
        because: vec![Arc::clone(&explicit)],
    };
    assert_eq!(
        depends.to_string(),
        "quantum-espresso depends on fftw+mpi when +invino"
    );
    assert_eq!(depends.because().len(), 1);
    let provides = Origin::Provides {
        virtual_name: "mpi".parse().unwrap(),
        provider: "mpich".parse().unwrap(),
        because: Vec::new(),
    };
    assert_eq!(provides.to_string(), "mpi is provided by mpich");
}
