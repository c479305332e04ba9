// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::time::Duration;

use hpk_schema::foundation::arch::Arch;
use hpk_schema::foundation::compiler::CompilerSpec;
use hpk_schema::{ConcreteSpec, DepType, PkgName};
use rstest::fixture;

use crate::{Database, DirectoryLayout, Store};

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter("hpk_database=trace,debug")
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(sub);
}

pub fn gcc() -> CompilerSpec {
    "gcc@10.2.1".parse().unwrap()
}

pub fn host() -> Arch {
    Arch::new("linux", "ubuntu22.04", "x86_64")
}

/// A concrete spec built with gcc for the host, that links
/// against each of `deps`.
pub fn concrete(name: &str, version: &str, deps: &[&ConcreteSpec]) -> ConcreteSpec {
    deps.iter()
        .fold(
            ConcreteSpec::builder(
                PkgName::new(name).unwrap(),
                version.parse().unwrap(),
                gcc(),
                host(),
            ),
            |builder, dep| builder.with_dependency((*dep).clone(), DepType::defaults(), []),
        )
        .build()
        .unwrap()
}

/// A spec that only needs `dep` to be built.
pub fn build_only(name: &str, version: &str, dep: &ConcreteSpec) -> ConcreteSpec {
    ConcreteSpec::builder(
        PkgName::new(name).unwrap(),
        version.parse().unwrap(),
        gcc(),
        host(),
    )
    .with_dependency(dep.clone(), [DepType::Build], [])
    .build()
    .unwrap()
}

pub fn external(name: &str, version: &str, prefix: &std::path::Path) -> ConcreteSpec {
    ConcreteSpec::builder(
        PkgName::new(name).unwrap(),
        version.parse().unwrap(),
        gcc(),
        host(),
    )
    .with_external(prefix)
    .build()
    .unwrap()
}

#[fixture]
pub fn libelf() -> ConcreteSpec {
    concrete("libelf", "0.8.13", &[])
}

#[fixture]
pub fn old_libelf() -> ConcreteSpec {
    concrete("libelf", "0.8.12", &[])
}

#[fixture]
pub fn libdwarf(libelf: ConcreteSpec) -> ConcreteSpec {
    concrete("libdwarf", "20130729", &[&libelf])
}

#[fixture]
pub fn tmpdir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("hpk-test-")
        .tempdir()
        .expect("Failed to establish temporary directory for testing")
}

/// A store in a temporary directory, removed on drop.
pub struct TempStore {
    pub store: Store,
    pub tmpdir: tempfile::TempDir,
}

impl std::ops::Deref for TempStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

#[fixture]
pub fn store(tmpdir: tempfile::TempDir) -> TempStore {
    let store = Store::open(tmpdir.path(), LOCK_TIMEOUT).unwrap();
    TempStore { store, tmpdir }
}

/// A database with a layout, in its own temporary directory.
pub struct TempDatabase {
    pub db: Database,
    pub tmpdir: tempfile::TempDir,
}

impl TempDatabase {
    /// Open a second handle on the same database, as another
    /// process would.
    pub fn reopen(&self, lock_timeout: Duration) -> Database {
        Database::new(
            self.tmpdir.path(),
            Some(DirectoryLayout::new(self.tmpdir.path())),
            lock_timeout,
        )
        .unwrap()
    }

    pub fn layout(&self) -> DirectoryLayout {
        DirectoryLayout::new(self.tmpdir.path())
    }
}

impl std::ops::Deref for TempDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

#[fixture]
pub fn database(tmpdir: tempfile::TempDir) -> TempDatabase {
    let db = Database::new(
        tmpdir.path(),
        Some(DirectoryLayout::new(tmpdir.path())),
        LOCK_TIMEOUT,
    )
    .unwrap();
    TempDatabase { db, tmpdir }
}
