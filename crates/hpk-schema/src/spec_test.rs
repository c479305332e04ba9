// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use rstest::rstest;

use super::Spec;
use crate::foundation::variant::VariantValue;

#[rstest]
#[case("quantum-espresso")]
#[case("quantum-espresso+veritas")]
#[case("quantum-espresso ^fftw@1.1:")]
#[case("quantum-espresso+invino ^fftw~mpi")]
#[case("fftw@:1.0")]
#[case("fftw@1.0+mpi %gcc@10.2.1")]
#[case("mpileaks %gcc@=13.2.0 ^callpath %clang")]
#[case("+invino")]
#[case("@2:")]
#[case("libelf@0.8.13 arch=linux-ubuntu22.04-x86_64")]
#[case("hdf5~debug+shared api=v18 build_type=Release")]
fn test_spec_display_round_trip(#[case] source: &str) {
    let spec = Spec::parse(source).unwrap();
    assert_eq!(spec.to_string(), source);
}

#[rstest]
#[case("quantum-espresso^fftw@1.1:", "quantum-espresso ^fftw@1.1:")]
#[case("quantum-espresso ^ fftw@1.1:", "quantum-espresso ^fftw@1.1:")]
#[case("  fftw  +mpi ", "fftw+mpi")]
#[case("fftw mpi=true", "fftw mpi=true")]
#[case("fftw % gcc", "fftw %gcc")]
#[case("zlib platform=linux target=x86_64", "zlib platform=linux target=x86_64")]
fn test_spec_normalized_display(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(Spec::parse(source).unwrap().to_string(), expected);
}

#[rstest]
#[case("")]
#[case("fftw ^")]
#[case("fftw zlib")]
#[case("Fftw")]
#[case("fftw@1.0@2.0")]
#[case("fftw+mpi~mpi")]
#[case("a ^b@1 ^b@2")]
fn test_spec_parse_errors(#[case] source: &str) {
    assert!(Spec::parse(source).is_err(), "{source:?} should not parse");
}

#[rstest]
fn test_repeated_dependencies_are_merged() {
    let spec = Spec::parse("mpileaks ^callpath@1: ^callpath+debug").unwrap();
    assert_eq!(spec.dependencies().len(), 1);
    assert_eq!(spec.to_string(), "mpileaks ^callpath@1:+debug");
}

#[rstest]
fn test_multi_valued_variant_parse() {
    let spec = Spec::parse("gcc languages=c,c++").unwrap();
    let value = spec
        .root()
        .variants
        .get("languages")
        .expect("variant is parsed");
    assert!(matches!(value, VariantValue::Multi(set) if set.len() == 2 && set.contains("c++")));
}

#[rstest]
#[case("gcc languages=c,c++ +debug")]
#[case("gcc+debug languages=c++")]
fn test_value_with_plus_before_flag(#[case] source: &str) {
    let spec = Spec::parse(source).unwrap();
    let variants = &spec.root().variants;
    assert!(
        variants
            .get("languages")
            .is_some_and(|v| v.values().contains("c++")),
        "{variants:?}"
    );
    assert_eq!(variants.get("debug"), Some(&VariantValue::Bool(true)));
}

#[rstest]
#[case("fftw@1.0+mpi", "fftw", true)]
#[case("fftw@1.0+mpi", "fftw@1:", true)]
#[case("fftw@1.0+mpi", "fftw~mpi", false)]
#[case("fftw@1.0", "fftw+mpi", false)]
#[case("fftw@1.0.3", "fftw@1.0", true)]
#[case("qe ^fftw@1.0", "qe ^fftw", true)]
#[case("qe", "qe ^fftw", false)]
#[case("qe %gcc@10.2.1", "qe %gcc@10:", true)]
fn test_spec_satisfies(#[case] spec: &str, #[case] other: &str, #[case] expected: bool) {
    let spec = Spec::parse(spec).unwrap();
    let other = Spec::parse(other).unwrap();
    assert_eq!(spec.satisfies(&other), expected);
}

#[rstest]
#[case("fftw@:1.0", "fftw@1.1:", false)]
#[case("fftw~mpi", "fftw+mpi", false)]
#[case("fftw~mpi", "fftw@1.0", true)]
#[case("fftw %gcc", "fftw %clang", false)]
#[case("+invino", "quantum-espresso+invino", true)]
fn test_spec_intersects(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
    let a = Spec::parse(a).unwrap();
    let b = Spec::parse(b).unwrap();
    assert_eq!(a.intersects(&b), expected);
}
