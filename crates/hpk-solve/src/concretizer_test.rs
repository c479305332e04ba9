// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::Path;
use std::sync::Arc;

use hpk_config::{Config, ExternalEntry, PackageSettings};
use hpk_schema::foundation::pkg_name;
use hpk_schema::{ConcreteSpec, Repository, spec};
use rstest::rstest;

use super::{Concretize, Concretizer};
use crate::Error;
use crate::fixtures::*;

fn concretizer(config: Config, repo: Arc<dyn Repository>) -> Concretizer {
    init_logging();
    Concretizer::new(Arc::new(config), repo)
}

fn explanation(err: Error) -> String {
    match err {
        Error::Unsatisfiable(err) => err.explanation,
        err => panic!("expected an unsatisfiable error, got: {err:?}"),
    }
}

#[rstest]
fn test_concretize_defaults(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let qe = spec!("quantum-espresso").concretized(&concretizer).unwrap();

    assert!(qe.satisfies(&spec!("quantum-espresso@1.0+invino+veritas")));
    assert_eq!(qe.compiler().to_string(), "gcc@10.2.1");
    assert_eq!(qe.arch(), &host());

    let fftw = qe.get("fftw").unwrap();
    assert!(fftw.satisfies(&spec!("fftw@1.0+mpi")));
    // providers are tried in name order without a preference
    let mpi = qe.provider_of("mpi").unwrap();
    assert_eq!(mpi.name(), &pkg_name!("mpich"));
    assert!(qe.get("zmpi").is_none());
    // dependencies inherit the compiler of their parent
    assert!(qe.traverse().iter().all(|s| s.compiler() == qe.compiler()));
}

#[rstest]
fn test_concretize_is_deterministic(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let first = "quantum-espresso".concretized(&concretizer).unwrap();
    let second = "quantum-espresso".concretized(&concretizer).unwrap();
    assert_eq!(first.dag_hash(), second.dag_hash());
}

#[rstest]
fn test_concretized_leaves_request_unchanged(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let request = spec!("libdwarf");
    let concrete = request.concretized(&concretizer).unwrap();
    assert_eq!(request.to_string(), "libdwarf");
    assert!(concrete.satisfies(&request));
}

#[rstest]
fn test_version_conflict_explanation(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let err = "quantum-espresso^fftw@1.1:"
        .concretized(&concretizer)
        .unwrap_err();
    let expected = "\
concretization failed for the following reasons:

   1. Cannot satisfy 'fftw@:1.0' and 'fftw@1.1:'
        required because quantum-espresso depends on fftw@:1.0
          required because quantum-espresso ^fftw@1.1: requested explicitly
        required because quantum-espresso ^fftw@1.1: requested explicitly";
    assert_eq!(explanation(err), expected);
}

#[rstest]
fn test_single_valued_variant_explanation(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let err = "quantum-espresso+invino ^fftw~mpi"
        .concretized(&concretizer)
        .unwrap_err();
    let message = explanation(err);
    assert!(
        message.contains("'fftw' required multiple values for single-valued variant 'mpi'"),
        "{message}"
    );
    assert!(
        message.contains("\n        Requested '~mpi' and '+mpi'"),
        "{message}"
    );
    assert!(
        message.contains("required because quantum-espresso depends on fftw+mpi when +invino"),
        "{message}"
    );
    assert!(
        message.contains("required because quantum-espresso+invino ^fftw~mpi requested explicitly"),
        "{message}"
    );
}

#[rstest]
fn test_unbuildable_without_matching_external(mut config: Config, repo: Arc<dyn Repository>) {
    config.packages.insert(
        "quantum-espresso".to_owned(),
        PackageSettings {
            buildable: Some(false),
            externals: vec![ExternalEntry {
                spec: "quantum-espresso@1.0~veritas".to_owned(),
                prefix: "/opt/qe".into(),
            }],
            ..Default::default()
        },
    );
    let concretizer = concretizer(config, repo);
    let err = "quantum-espresso+veritas"
        .concretized(&concretizer)
        .unwrap_err();
    let message = explanation(err);
    assert!(
        message.contains(
            "Attempted to build package quantum-espresso which is not buildable and does not have a satisfying external"
        ),
        "{message}"
    );
    assert!(
        message.contains(
            "'quantum-espresso~veritas' is an external constraint for quantum-espresso which was not satisfied"
        ),
        "{message}"
    );
    assert!(
        message.contains("'quantum-espresso+veritas' required"),
        "{message}"
    );

    // the external is used when it fits
    let qe = "quantum-espresso~veritas".concretized(&concretizer).unwrap();
    assert_eq!(qe.external(), Some(Path::new("/opt/qe")));
}

#[rstest]
fn test_external_preferred_over_build(mut config: Config, repo: Arc<dyn Repository>) {
    config.packages.insert(
        "libelf".to_owned(),
        PackageSettings {
            externals: vec![ExternalEntry {
                spec: "libelf@0.8.12".to_owned(),
                prefix: "/usr".into(),
            }],
            ..Default::default()
        },
    );
    let concretizer = concretizer(config, repo);
    let libdwarf = "libdwarf".concretized(&concretizer).unwrap();
    let libelf = libdwarf.get("libelf").unwrap();
    assert!(libelf.is_external());
    assert_eq!(libelf.version().to_string(), "0.8.12");

    // an explicit version the external cannot meet is built instead
    let libdwarf = "libdwarf ^libelf@0.8.13".concretized(&concretizer).unwrap();
    assert!(!libdwarf.get("libelf").unwrap().is_external());
}

#[rstest]
#[case::explicit_provider("quantum-espresso ^zmpi", "zmpi")]
#[case::provider_constraint("quantum-espresso ^mpi@4", "zmpi")]
#[case::default_provider("quantum-espresso", "mpich")]
fn test_virtual_providers(
    config: Config,
    repo: Arc<dyn Repository>,
    #[case] request: &str,
    #[case] provider: &str,
) {
    let concretizer = concretizer(config, repo);
    let qe = request.concretized(&concretizer).unwrap();
    assert_eq!(qe.provider_of("mpi").unwrap().name().as_str(), provider);
}

#[rstest]
fn test_virtual_provider_preference(mut config: Config, repo: Arc<dyn Repository>) {
    config
        .packages
        .entry("all".to_owned())
        .or_default()
        .providers
        .insert("mpi".to_owned(), vec!["zmpi".to_owned()]);
    let concretizer = concretizer(config, repo);
    let qe = "quantum-espresso".concretized(&concretizer).unwrap();
    let mpi = qe.provider_of("mpi").unwrap();
    assert_eq!(mpi.name(), &pkg_name!("zmpi"));
    assert!(mpi.get("fake").is_some());
}

#[rstest]
fn test_no_virtual_dependency_without_condition(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let qe = "quantum-espresso~invino ^fftw~mpi"
        .concretized(&concretizer)
        .unwrap();
    assert!(qe.provider_of("mpi").is_none());
    assert!(qe.get("mpich").is_none());
}

#[rstest]
fn test_multi_valued_variants_are_merged(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let consumer = "multivalue-consumer ^multivalue-variant foo=bar"
        .concretized(&concretizer)
        .unwrap();
    let variant = consumer.get("multivalue-variant").unwrap();
    assert!(variant.satisfies(&spec!("multivalue-variant foo=bar,baz fee=bar")));
    assert!(!variant.satisfies(&spec!("multivalue-variant foo=barbaz")));

    // without a request, only the dependency's value is used
    let consumer = "multivalue-consumer".concretized(&concretizer).unwrap();
    let variant = consumer.get("multivalue-variant").unwrap();
    assert!(variant.satisfies(&spec!("multivalue-variant foo=baz")));
    assert!(!variant.satisfies(&spec!("multivalue-variant foo=bar")));
}

#[rstest]
#[case::root("quantum-espresso%gcc@=1.0", "No compilers with spec gcc@=1.0 found")]
#[case::dependency(
    "quantum-espresso ^fftw%gcc@=1.0",
    "No compilers with spec gcc@=1.0 found"
)]
fn test_unavailable_compiler(
    config: Config,
    repo: Arc<dyn Repository>,
    #[case] request: &str,
    #[case] message: &str,
) {
    let concretizer = concretizer(config, repo);
    let err = request.concretized(&concretizer).unwrap_err();
    assert!(matches!(err, Error::UnavailableCompilerVersion(_)), "{err:?}");
    assert_eq!(err.to_string(), message);
}

#[rstest]
fn test_requested_compiler_is_used(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let libdwarf = "libdwarf%clang".concretized(&concretizer).unwrap();
    assert_eq!(libdwarf.compiler().to_string(), "clang@15.0.0");
    assert_eq!(
        libdwarf.get("libelf").unwrap().compiler().to_string(),
        "clang@15.0.0"
    );
}

#[rstest]
fn test_invalid_dependency(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let err = "libelf ^fftw".concretized(&concretizer).unwrap_err();
    assert!(matches!(err, Error::InvalidDependency(_)), "{err:?}");
    assert_eq!(err.to_string(), "libelf does not depend on fftw");
}

#[rstest]
fn test_unknown_package(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let err = "not-a-package".concretized(&concretizer).unwrap_err();
    assert!(matches!(err, Error::UnknownPackage(_)), "{err:?}");
}

#[rstest]
fn test_concretize_together_shares_nodes(config: Config, repo: Arc<dyn Repository>) {
    let concretizer = concretizer(config, repo);
    let specs = concretizer
        .concretize(&[spec!("libdwarf"), spec!("libelf")])
        .unwrap();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].name(), &pkg_name!("libdwarf"));
    assert_eq!(specs[1].name(), &pkg_name!("libelf"));
    assert_eq!(
        specs[0].get("libelf").unwrap().dag_hash(),
        specs[1].dag_hash()
    );
    assert!(concretizer.concretize(&[]).unwrap().is_empty());
}

fn installed(concretizer: &Concretizer, request: &str) -> ConcreteSpec {
    request.concretized(concretizer).unwrap()
}

#[rstest]
fn test_reuse_installed_spec(mut config: Config, repo: Arc<dyn Repository>) {
    let old = installed(&concretizer(config.clone(), Arc::clone(&repo)), "libelf@0.8.12");

    // reuse is off by default, so the newest version is built
    let fresh = concretizer(config.clone(), Arc::clone(&repo)).with_reusable([old.clone()]);
    let libelf = "libelf".concretized(&fresh).unwrap();
    assert_eq!(libelf.version().to_string(), "0.8.13");

    config.concretizer.reuse = true;
    let reusing = concretizer(config, repo).with_reusable([old.clone()]);
    let libelf = "libelf".concretized(&reusing).unwrap();
    assert_eq!(libelf.dag_hash(), old.dag_hash());
    let libdwarf = "libdwarf".concretized(&reusing).unwrap();
    assert_eq!(libdwarf.get("libelf").unwrap().dag_hash(), old.dag_hash());

    // a new constraint the installed spec does not meet wins over reuse
    let libelf = "libelf@0.8.13".concretized(&reusing).unwrap();
    assert_ne!(libelf.dag_hash(), old.dag_hash());
    assert_eq!(libelf.version().to_string(), "0.8.13");
}

#[rstest]
fn test_reuse_with_unconfigured_compiler(mut config: Config, repo: Arc<dyn Repository>) {
    config.concretizer.reuse = true;
    let old = ConcreteSpec::builder(
        pkg_name!("libelf"),
        "0.8.12".parse().unwrap(),
        "gcc@4.8.5".parse().unwrap(),
        host(),
    )
    .build()
    .unwrap();
    let concretizer = concretizer(config, repo).with_reusable([old.clone()]);
    let libelf = "libelf".concretized(&concretizer).unwrap();
    assert_eq!(libelf.dag_hash(), old.dag_hash());
    assert_eq!(libelf.compiler().to_string(), "gcc@4.8.5");

    // the compiler still cannot be used for new builds
    let err = "libelf@0.8.13%gcc@=4.8.5"
        .concretized(&concretizer)
        .unwrap_err();
    assert!(matches!(err, Error::Unsatisfiable(_)), "{err:?}");
}
