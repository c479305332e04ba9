// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::time::Duration;

use rstest::rstest;

use super::{DatabaseLock, LockKind};
use crate::Error;
use crate::fixtures::*;

const SHORT: Duration = Duration::from_millis(200);

#[rstest]
fn test_exclusive_lock_excludes_others(tmpdir: tempfile::TempDir) {
    init_logging();
    let path = tmpdir.path().join("lock");
    let held = DatabaseLock::acquire(&path, LockKind::Exclusive, SHORT).unwrap();
    assert_eq!(held.kind(), LockKind::Exclusive);

    for kind in [LockKind::Exclusive, LockKind::Shared] {
        let res = DatabaseLock::acquire(&path, kind, SHORT);
        assert!(
            matches!(res, Err(Error::LockTimeout { .. })),
            "expected a {kind} lock to time out, got: {res:?}"
        );
    }
}

#[rstest]
fn test_shared_locks_coexist(tmpdir: tempfile::TempDir) {
    let path = tmpdir.path().join("lock");
    let _first = DatabaseLock::acquire(&path, LockKind::Shared, SHORT).unwrap();
    let _second = DatabaseLock::acquire(&path, LockKind::Shared, SHORT).unwrap();
    let res = DatabaseLock::acquire(&path, LockKind::Exclusive, SHORT);
    assert!(matches!(res, Err(Error::LockTimeout { .. })));
}

#[rstest]
fn test_lock_released_on_drop(tmpdir: tempfile::TempDir) {
    let path = tmpdir.path().join("lock");
    let held = DatabaseLock::acquire(&path, LockKind::Exclusive, SHORT).unwrap();
    drop(held);
    DatabaseLock::acquire(&path, LockKind::Exclusive, SHORT)
        .expect("lock should be free once the holder is dropped");
}

#[rstest]
fn test_waits_for_lock_to_be_released(tmpdir: tempfile::TempDir) {
    let path = tmpdir.path().join("lock");
    let held = DatabaseLock::acquire(&path, LockKind::Exclusive, SHORT).unwrap();
    let release = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        drop(held);
    });
    DatabaseLock::acquire(&path, LockKind::Exclusive, Duration::from_secs(5))
        .expect("lock should be acquired after the holder releases it");
    release.join().unwrap();
}

#[rstest]
fn test_lock_in_missing_directory(tmpdir: tempfile::TempDir) {
    let path = tmpdir.path().join("missing").join("lock");
    let res = DatabaseLock::acquire(&path, LockKind::Shared, SHORT);
    assert!(matches!(res, Err(Error::FileOpenError(..))));
}
