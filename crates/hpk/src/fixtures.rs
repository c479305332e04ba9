// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::sync::Arc;

use hpk_config::Config;
use hpk_schema::{MemRepository, Repository};
use rstest::fixture;

use crate::Session;

pub fn init_logging() {
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter("hpk=trace,hpk_database=debug,hpk_solve=debug,info")
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(sub);
}

static CONFIG: &str = r#"
compilers:
  - spec: gcc@=10.2.1
    operating_system: ubuntu22.04
    target: x86_64
  - spec: clang@=15.0.0
    operating_system: ubuntu22.04
    target: x86_64
host:
  platform: linux
  os: ubuntu22.04
  target: x86_64
"#;

pub fn mock_repo() -> MemRepository {
    hpk_schema::make_repo!([
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
            "name": "fftw",
            "versions": [{"version": "1.0"}, {"version": "0.9"}],
            "variants": [{"name": "mpi", "default": false}],
        },
        {
            "name": "quantum-espresso",
            "versions": [{"version": "1.0"}],
            "depends_on": [{"spec": "fftw@:1.0"}],
        },
    ])
}

/// A session whose store lives in a temporary directory.
pub struct TempSession {
    pub session: Session,
    pub tmpdir: tempfile::TempDir,
}

impl TempSession {
    /// Open another session on the same store, with reuse turned
    /// on or off.
    pub fn with_reuse(&self, reuse: bool) -> Session {
        let mut config = (**self.session.config()).clone();
        config.concretizer.reuse = reuse;
        Session::new(Arc::new(config), Arc::clone(self.session.repository())).unwrap()
    }
}

impl std::ops::Deref for TempSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

#[fixture]
pub fn session() -> TempSession {
    let tmpdir = tempfile::Builder::new()
        .prefix("hpk-test-")
        .tempdir()
        .expect("Failed to establish temporary directory for testing");
    let mut config = Config::from_yaml(CONFIG).unwrap();
    config.store.root = tmpdir.path().join("store");
    config.store.lock_timeout_seconds = 5;
    let repo: Arc<dyn Repository> = Arc::new(mock_repo());
    let session = Session::new(Arc::new(config), repo).unwrap();
    TempSession { session, tmpdir }
}
