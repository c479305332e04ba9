// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::foundation::arch::Arch;
use hpk_schema::{MemRepository, Repository};
use rstest::fixture;

pub fn init_logging() {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter("hpk_solve=trace,debug")
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(sub);
}

pub static COMPILERS: &str = r#"
compilers:
  - spec: gcc@=10.2.1
    operating_system: ubuntu22.04
    target: x86_64
  - spec: gcc@=9.4.0
    operating_system: ubuntu22.04
    target: x86_64
  - spec: gcc@=9.4.0
    operating_system: ubuntu20.04
    target: x86_64
  - spec: clang@=15.0.0
    operating_system: ubuntu22.04
    target: x86_64
host:
  platform: linux
  os: ubuntu22.04
  target: x86_64
"#;

pub fn host() -> Arch {
    Arch::new("linux", "ubuntu22.04", "x86_64")
}

#[fixture]
pub fn config() -> Config {
    Config::from_yaml(COMPILERS).unwrap()
}

/// A small set of packages, with a virtual `mpi` provided by both
/// `mpich` and `zmpi`.
pub fn mock_repo() -> MemRepository {
    hpk_schema::make_repo!([
        {
            "name": "quantum-espresso",
            "versions": [{"version": "1.0"}],
            "variants": [
                {"name": "invino", "default": true},
                {"name": "veritas", "default": true},
            ],
            "depends_on": [
                {"spec": "fftw@:1.0"},
                {"spec": "fftw+mpi", "when": "+invino"},
            ],
        },
        {
            "name": "fftw",
            "versions": [{"version": "1.0"}, {"version": "0.9"}],
            "variants": [{"name": "mpi", "default": true}],
            "depends_on": [{"spec": "mpi", "when": "+mpi"}],
        },
        {
            "name": "mpich",
            "versions": [{"version": "3.4"}],
            "provides": [{"spec": "mpi@:3"}],
        },
        {
            "name": "zmpi",
            "versions": [{"version": "1.0"}],
            "provides": [{"spec": "mpi"}],
            "depends_on": [{"spec": "fake"}],
        },
        {
            "name": "fake",
            "versions": [{"version": "1.0"}],
        },
        {
            "name": "libelf",
            "versions": [{"version": "0.8.13"}, {"version": "0.8.12"}],
        },
        {
            "name": "libdwarf",
            "versions": [{"version": "20130729"}],
            "depends_on": [{"spec": "libelf"}],
        },
        {
            "name": "multivalue-variant",
            "versions": [{"version": "1.0"}],
            "variants": [
                {
                    "name": "foo",
                    "kind": "multi",
                    "values": ["bar", "baz", "barbaz"],
                    "default": "bar",
                },
                {
                    "name": "fee",
                    "kind": "single",
                    "values": ["bar", "baz"],
                    "default": "bar",
                },
            ],
        },
        {
            "name": "multivalue-consumer",
            "versions": [{"version": "1.0"}],
            "depends_on": [{"spec": "multivalue-variant foo=baz"}],
        },
    ])
}

#[fixture]
pub fn repo() -> Arc<dyn Repository> {
    Arc::new(mock_repo())
}
