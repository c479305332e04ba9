// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::Path;

use rstest::rstest;

use super::{Config, get_config, load_config};

static CONFIG: &str = r#"
compilers:
  - spec: gcc@=10.2.1
    operating_system: ubuntu22.04
    target: x86_64
    paths:
      cc: /usr/bin/gcc-10
      cxx: /usr/bin/g++-10
  - spec: clang@=15.0.0
    operating_system: ubuntu22.04
    target: x86_64
packages:
  all:
    compiler: [clang, gcc]
    variants: ~debug
    providers:
      mpi: [zmpi, mpich]
  quantum-espresso:
    buildable: false
    externals:
      - spec: quantum-espresso@1.0~veritas
        prefix: /path/to/qe
  fftw:
    version: ["0.9"]
    variants: ~mpi
    compiler: [gcc]
concretizer:
  reuse: true
host:
  platform: linux
  os: ubuntu22.04
  target: x86_64
"#;

#[rstest]
fn test_config_from_yaml() {
    let config = Config::from_yaml(CONFIG).unwrap();
    assert_eq!(config.compilers.len(), 2);
    assert_eq!(config.compilers[0].spec, "gcc@=10.2.1");
    assert_eq!(
        config.compilers[0].paths.cc.as_deref(),
        Some(Path::new("/usr/bin/gcc-10"))
    );
    assert!(config.compilers[1].paths.cc.is_none());
    assert!(config.concretizer.reuse);
    assert!(!config.concretizer.bootstrap_compilers);
    assert_eq!(config.concretizer.max_steps, 100_000);
    assert_eq!(config.host.os, "ubuntu22.04");
    assert_eq!(config.store.lock_timeout_seconds, 120);
}

#[rstest]
fn test_package_settings_fall_back_to_all() {
    let config = Config::from_yaml(CONFIG).unwrap();
    assert!(!config.is_buildable("quantum-espresso"));
    assert!(config.is_buildable("fftw"));
    assert_eq!(config.externals("quantum-espresso").len(), 1);
    assert_eq!(
        config.externals("quantum-espresso")[0].prefix,
        Path::new("/path/to/qe")
    );
    assert!(config.externals("fftw").is_empty());

    assert_eq!(config.version_preferences("fftw"), ["0.9"]);
    assert_eq!(config.variant_preferences("fftw"), Some("~mpi"));
    assert_eq!(config.variant_preferences("zlib"), Some("~debug"));
    assert_eq!(config.compiler_preferences("fftw"), ["gcc"]);
    assert_eq!(config.compiler_preferences("zlib"), ["clang", "gcc"]);
    assert_eq!(config.provider_preferences("mpi"), ["zmpi", "mpich"]);
    assert!(config.provider_preferences("blas").is_empty());
}

#[rstest]
fn test_empty_config_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert!(config.compilers.is_empty());
    assert!(config.is_buildable("anything"));
    assert!(!config.concretizer.reuse);
    assert!(config.store.root.ends_with("hpk"));
}

#[rstest]
fn test_load_config_env_overrides() {
    // SAFETY: no other test in this crate reads these variables
    unsafe {
        std::env::set_var("HPK_CONCRETIZER_REUSE", "true");
        std::env::set_var("HPK_CONCRETIZER_MAX_STEPS", "25");
        std::env::set_var("HPK_LOG", "debug");
    }
    let config = load_config().unwrap();
    assert!(config.concretizer.reuse);
    assert_eq!(config.concretizer.max_steps, 25);
}

#[rstest]
fn test_make_current_replaces_config() {
    let first = Config::from_yaml("concretizer:\n  max_steps: 10\n").unwrap();
    first.make_current().unwrap();
    assert_eq!(get_config().unwrap().concretizer.max_steps, 10);

    let second = Config::from_yaml("concretizer:\n  max_steps: 20\n").unwrap();
    let current = second.make_current().unwrap();
    assert_eq!(current.concretizer.max_steps, 20);
    assert_eq!(Config::current().unwrap().concretizer.max_steps, 20);
}
