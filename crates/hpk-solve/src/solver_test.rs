// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::{ConcreteSpec, Repository, Spec, make_repo, spec};
use rstest::{fixture, rstest};

use super::Solver;
use crate::fixtures::*;
use crate::{Error, ProblemSetup, Result};

/// Packages where the first choice for `b` only fails once `c`
/// has been decided.
#[fixture]
fn backjump_repo() -> Arc<dyn Repository> {
    Arc::new(make_repo!([
        {
            "name": "a",
            "versions": [{"version": "1.0"}],
            "depends_on": [{"spec": "b"}, {"spec": "c"}],
        },
        {
            "name": "b",
            "versions": [{"version": "2.0"}, {"version": "1.0"}],
            "depends_on": [
                {"spec": "d@2", "when": "@2.0"},
                {"spec": "d@1", "when": "@1.0"},
            ],
        },
        {
            "name": "c",
            "versions": [{"version": "1.0"}],
            "depends_on": [{"spec": "d@1"}],
        },
        {
            "name": "d",
            "versions": [{"version": "2.0"}, {"version": "1.0"}],
        },
        {
            "name": "e",
            "versions": [{"version": "1.0"}],
            "conflicts": [{"spec": "%clang", "msg": "e does not build with clang"}],
        },
        {
            "name": "g",
            "versions": [
                {"version": "2.0", "deprecated": true},
                {"version": "1.0"},
            ],
        },
    ]))
}

fn solve(config: Config, repo: Arc<dyn Repository>, specs: &[Spec]) -> (Result<Vec<ConcreteSpec>>, u64) {
    init_logging();
    let problem = ProblemSetup::new(Arc::new(config), repo)
        .setup(specs, &[])
        .unwrap();
    let mut solver = Solver::new(problem);
    let result = solver.solve();
    (result, solver.steps())
}

#[rstest]
fn test_one_step_per_decision(config: Config, repo: Arc<dyn Repository>) {
    let (result, steps) = solve(config, repo, &[spec!("libdwarf")]);
    let specs = result.unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(steps, 2);
}

#[rstest]
fn test_step_limit(mut config: Config, repo: Arc<dyn Repository>) {
    config.concretizer.max_steps = 1;
    let (result, _) = solve(config, repo, &[spec!("libdwarf")]);
    let err = result.unwrap_err();
    assert!(matches!(err, Error::SolverInterrupted(_)), "{err:?}");
}

#[rstest]
fn test_backjump_to_conflicting_decision(config: Config, backjump_repo: Arc<dyn Repository>) {
    let (result, _) = solve(config, backjump_repo, &[spec!("a")]);
    let a = result.unwrap().remove(0);
    assert_eq!(a.get("b").unwrap().version().to_string(), "1.0");
    assert_eq!(a.get("d").unwrap().version().to_string(), "1.0");
    assert!(a.satisfies(&spec!("a ^b@1.0 ^c@1.0 ^d@1.0")));
}

#[rstest]
fn test_explicit_version_conflict_fails(config: Config, backjump_repo: Arc<dyn Repository>) {
    let (result, _) = solve(config, backjump_repo, &[spec!("a ^d@2")]);
    match result.unwrap_err() {
        Error::Unsatisfiable(err) => {
            assert!(
                err.explanation.contains("Cannot satisfy 'd@1' and 'd@2'"),
                "{}",
                err.explanation
            );
            assert!(
                err.explanation.contains("required because c depends on d@1"),
                "{}",
                err.explanation
            );
        }
        err => panic!("expected an unsatisfiable error, got: {err:?}"),
    }
}

#[rstest]
fn test_package_conflict_rejects_candidates(config: Config, backjump_repo: Arc<dyn Repository>) {
    let (result, _) = solve(config.clone(), Arc::clone(&backjump_repo), &[spec!("e")]);
    assert_eq!(result.unwrap()[0].compiler().to_string(), "gcc@10.2.1");

    let (result, _) = solve(config, backjump_repo, &[spec!("e%clang")]);
    match result.unwrap_err() {
        Error::Unsatisfiable(err) => {
            assert!(
                err.explanation.contains("e does not build with clang"),
                "{}",
                err.explanation
            );
        }
        err => panic!("expected an unsatisfiable error, got: {err:?}"),
    }
}

#[rstest]
#[case::avoided("g", "1.0")]
#[case::pinned("g@=2.0", "2.0")]
fn test_deprecated_versions(
    config: Config,
    backjump_repo: Arc<dyn Repository>,
    #[case] request: &str,
    #[case] version: &str,
) {
    let (result, _) = solve(config, backjump_repo, &[spec!(request)]);
    assert_eq!(result.unwrap()[0].version().to_string(), version);
}

#[rstest]
fn test_configured_preferences(mut config: Config, repo: Arc<dyn Repository>) {
    let libelf = config.packages.entry("libelf".to_owned()).or_default();
    libelf.version = vec!["0.8.12".to_owned()];
    let fftw = config.packages.entry("fftw".to_owned()).or_default();
    fftw.variants = Some("~mpi".to_owned());

    let (result, _) = solve(config, repo, &[spec!("libdwarf"), spec!("fftw")]);
    let specs = result.unwrap();
    assert_eq!(specs[0].get("libelf").unwrap().version().to_string(), "0.8.12");
    assert!(specs[1].satisfies(&spec!("fftw@1.0~mpi")));
    assert!(specs[1].provider_of("mpi").is_none());
}

#[rstest]
fn test_dependency_requested_but_not_needed(config: Config, repo: Arc<dyn Repository>) {
    // fftw only needs mpi when +mpi
    let (result, _) = solve(config, repo, &[spec!("fftw~mpi ^mpich")]);
    match result.unwrap_err() {
        Error::Unsatisfiable(err) => {
            assert!(
                err.explanation
                    .contains("'mpich' was requested as a dependency, but nothing depends on it"),
                "{}",
                err.explanation
            );
        }
        err => panic!("expected an unsatisfiable error, got: {err:?}"),
    }
}

#[rstest]
fn test_results_follow_request_order(config: Config, repo: Arc<dyn Repository>) {
    let (result, _) = solve(config, repo, &[spec!("libelf@0.8.12"), spec!("multivalue-variant")]);
    let specs = result.unwrap();
    assert_eq!(specs[0].name().as_str(), "libelf");
    assert_eq!(specs[1].name().as_str(), "multivalue-variant");
    assert!(specs[1].satisfies(&spec!("multivalue-variant foo=bar fee=bar")));
}
