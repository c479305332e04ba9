// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./lock_test.rs"]
mod lock_test;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// An advisory lock on the database, held until dropped.
///
/// Any number of shared locks may be held at once, but an exclusive
/// lock excludes every other lock, across processes.
#[derive(Debug)]
pub struct DatabaseLock {
    file: File,
    path: PathBuf,
    kind: LockKind,
}

impl DatabaseLock {
    /// Take the lock, waiting up to `timeout` for other holders to
    /// release it.
    pub fn acquire(path: &Path, kind: LockKind, timeout: Duration) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| Error::FileOpenError(path.to_owned(), err))?;

        let deadline = Instant::now() + timeout;
        let mut waited = false;
        loop {
            let attempt = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(_) => {
                    if waited {
                        tracing::debug!(path = %path.display(), %kind, "acquired lock after waiting");
                    }
                    return Ok(Self {
                        file,
                        path: path.to_owned(),
                        kind,
                    });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    // Wait up until the timeout to acquire the lock,
                    // but fail immediately for any other problem.
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout {
                            path: path.to_owned(),
                            timeout,
                        });
                    }
                    if !waited {
                        tracing::debug!(path = %path.display(), %kind, "waiting for lock");
                        waited = true;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(Error::LockError(path.to_owned(), err)),
            }
        }
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::warn!(?err, path = ?self.path, "Failed to release database lock");
        }
    }
}
