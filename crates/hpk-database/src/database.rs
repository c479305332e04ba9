// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use hpk_schema::{ConcreteSpec, DagHash};

use crate::index::IndexFile;
use crate::layout::{DirectoryLayout, METADATA_DIR, SkippedPrefix};
use crate::lock::{DatabaseLock, LockKind};
use crate::{Direction, Error, Index, InstallRecord, InstallStatuses, Query, Result};

#[cfg(test)]
#[path = "./database_test.rs"]
mod database_test;

const DB_DIR: &str = "db";
const INDEX_FILE: &str = "index.json";
const VERIFIER_FILE: &str = "index_verifier";
const LOCK_FILE: &str = "lock";

/// What a reindex found under the store root.
#[derive(Clone, Debug, Default)]
pub struct ReindexReport {
    /// Specs read back from their install prefix.
    pub installed: usize,
    /// Specs read back from the prefix of their deprecator.
    pub deprecated: usize,
    /// Specs only known from the previous index, like externals.
    pub recovered: usize,
    /// Prefixes that could not be read, and were left out.
    pub skipped: Vec<SkippedPrefix>,
}

#[derive(Debug, Default)]
struct Cache {
    verifier: Option<String>,
    index: Index,
}

/// The index of every installed spec, kept in a json file under
/// the store root.
///
/// Every access goes through a transaction which holds a file lock,
/// so that any number of processes can share one database.
#[derive(Debug)]
pub struct Database {
    root: PathBuf,
    index_path: PathBuf,
    verifier_path: PathBuf,
    lock_path: PathBuf,
    layout: Option<DirectoryLayout>,
    lock_timeout: Duration,
    cache: Mutex<Cache>,
}

impl Database {
    /// Open the database of the store at `root`, creating its
    /// directory if needed.
    ///
    /// Without a layout, the database can not check install prefixes
    /// and so can not be reindexed.
    pub fn new<P: Into<PathBuf>>(
        root: P,
        layout: Option<DirectoryLayout>,
        lock_timeout: Duration,
    ) -> Result<Self> {
        let root = root.into();
        let db_dir = root.join(METADATA_DIR).join(DB_DIR);
        std::fs::create_dir_all(&db_dir)
            .map_err(|err| Error::DirectoryCreateError(db_dir.clone(), err))?;
        Ok(Self {
            index_path: db_dir.join(INDEX_FILE),
            verifier_path: db_dir.join(VERIFIER_FILE),
            lock_path: db_dir.join(LOCK_FILE),
            root,
            layout,
            lock_timeout,
            cache: Mutex::new(Cache::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn layout(&self) -> Option<&DirectoryLayout> {
        self.layout.as_ref()
    }

    /// Take a shared lock and a snapshot of the index.
    pub fn read_transaction(&self) -> Result<ReadTransaction> {
        let lock = self.lock(LockKind::Shared)?;
        let index = self.load()?;
        Ok(ReadTransaction { _lock: lock, index })
    }

    /// Take an exclusive lock and a working copy of the index.
    ///
    /// Changes are only saved by [`WriteTransaction::commit`].
    pub fn write_transaction(&self) -> Result<WriteTransaction<'_>> {
        let lock = self.lock(LockKind::Exclusive)?;
        let index = self.load()?;
        Ok(WriteTransaction {
            db: self,
            _lock: lock,
            index,
            committed: false,
        })
    }

    /// Change the index in a single write transaction, which is
    /// committed only when `update` succeeds.
    pub fn update<T, F>(&self, update: F) -> Result<T>
    where
        F: FnOnce(&mut Index) -> Result<T>,
    {
        let mut transaction = self.write_transaction()?;
        let result = update(&mut transaction)?;
        transaction.commit()?;
        Ok(result)
    }

    fn lock(&self, kind: LockKind) -> Result<DatabaseLock> {
        DatabaseLock::acquire(&self.lock_path, kind, self.lock_timeout)
    }

    fn cache(&self) -> Result<MutexGuard<'_, Cache>> {
        self.cache.lock().map_err(|_| Error::CachePoisoned)
    }

    /// The current index, only read from disk when it was changed
    /// since the last time.
    fn load(&self) -> Result<Index> {
        let verifier = self.read_verifier()?;
        let mut cache = self.cache()?;
        if verifier.is_some() && cache.verifier == verifier {
            return Ok(cache.index.clone());
        }
        let index = self.read_index()?.unwrap_or_default();
        cache.verifier = verifier;
        cache.index = index.clone();
        Ok(index)
    }

    fn read_verifier(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.verifier_path) {
            Ok(verifier) => Ok(Some(verifier.trim().to_owned())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::FileReadError(self.verifier_path.clone(), err)),
        }
    }

    /// Read the index file, if there is one.
    fn read_index(&self) -> Result<Option<Index>> {
        let text = match std::fs::read_to_string(&self.index_path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::FileReadError(self.index_path.clone(), err)),
        };
        let file: IndexFile = serde_json::from_str(&text)
            .map_err(|err| Error::CorruptIndex(self.index_path.clone(), err.to_string()))?;
        match Index::from_file(file) {
            Ok(index) => Ok(Some(index)),
            Err(err @ Error::InvalidDatabaseVersion { .. }) => Err(err),
            Err(err) => Err(Error::CorruptIndex(self.index_path.clone(), err.to_string())),
        }
    }

    /// Replace the index file and its verifier.
    ///
    /// The caller must hold the exclusive lock.
    fn write_index(&self, index: &Index) -> Result<()> {
        let working = self.index_path.with_extension("json.work");
        let contents = serde_json::to_vec_pretty(&index.to_file())?;
        std::fs::write(&working, contents)
            .map_err(|err| Error::StorageWriteError("index working file", working.clone(), err))?;
        if let Err(err) = std::fs::rename(&working, &self.index_path) {
            if let Err(err) = std::fs::remove_file(&working) {
                tracing::warn!(?err, path = ?working, "Failed to clean up index working file");
            }
            return Err(Error::StorageWriteError(
                "rename index working file",
                self.index_path.clone(),
                err,
            ));
        }

        let verifier = ulid::Ulid::new().to_string();
        std::fs::write(&self.verifier_path, &verifier).map_err(|err| {
            Error::StorageWriteError("index verifier", self.verifier_path.clone(), err)
        })?;
        let mut cache = self.cache()?;
        cache.verifier = Some(verifier);
        cache.index = index.clone();
        Ok(())
    }

    /// Record an installed spec and its dependencies.
    pub fn add(&self, spec: &ConcreteSpec, explicit: bool) -> Result<()> {
        tracing::debug!(spec = %spec.format_node(), explicit, "adding to database");
        self.update(|index| index.add(spec, self.layout.as_ref(), explicit, None))
    }

    /// Remove a spec, see [`Index::remove`].
    pub fn remove(&self, spec: &ConcreteSpec) -> Result<ConcreteSpec> {
        tracing::debug!(spec = %spec.format_node(), "removing from database");
        self.update(|index| index.remove(spec))
    }

    /// Mark `spec` as replaced by `deprecator`, returning the hash of
    /// the spec that previously replaced it.
    pub fn deprecate(
        &self,
        spec: &ConcreteSpec,
        deprecator: &ConcreteSpec,
    ) -> Result<Option<DagHash>> {
        self.update(|index| index.deprecate(spec, deprecator))
    }

    pub fn deprecator(&self, spec: &ConcreteSpec) -> Result<Option<ConcreteSpec>> {
        self.read_transaction()?.deprecator(spec)
    }

    pub fn specs_deprecated_by(&self, spec: &ConcreteSpec) -> Result<Vec<ConcreteSpec>> {
        Ok(self.read_transaction()?.specs_deprecated_by(spec))
    }

    pub fn update_explicit(&self, spec: &ConcreteSpec, explicit: bool) -> Result<()> {
        let mut transaction = self.write_transaction()?;
        if transaction.update_explicit(spec, explicit)? {
            transaction.commit()?;
        }
        Ok(())
    }

    pub fn installed_relatives(
        &self,
        query: &Query,
        direction: Direction,
        transitive: bool,
    ) -> Result<BTreeSet<ConcreteSpec>> {
        Ok(self
            .read_transaction()?
            .installed_relatives(query, direction, transitive))
    }

    pub fn unused_specs(&self) -> Result<Vec<ConcreteSpec>> {
        Ok(self.read_transaction()?.unused_specs())
    }

    /// True if the spec is known to the database, but not installed.
    pub fn missing(&self, spec: &ConcreteSpec) -> Result<bool> {
        Ok(self.read_transaction()?.missing(spec))
    }

    /// Find the specs that match the query, sorted.
    ///
    /// The index is rebuilt from the store first when it does not
    /// exist yet.
    pub fn query(&self, query: &Query) -> Result<Vec<ConcreteSpec>> {
        if self.layout.is_some() && !self.index_path.exists() {
            tracing::info!(path = %self.index_path.display(), "no database index, reindexing");
            self.reindex()?;
        }
        self.query_local(query)
    }

    /// Find the specs that match the query in the index as it is.
    pub fn query_local(&self, query: &Query) -> Result<Vec<ConcreteSpec>> {
        Ok(self.read_transaction()?.query(query))
    }

    /// Find the single spec that matches the query, if any.
    pub fn query_one(&self, query: &Query) -> Result<Option<ConcreteSpec>> {
        let mut results = self.query(query)?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            _ => Err(Error::AmbiguousQuery {
                query: query.to_string(),
                matches: results.iter().map(|s| s.format_node()).collect(),
            }),
        }
    }

    pub fn query_local_by_spec_hash(&self, hash: &DagHash) -> Result<Option<InstallRecord>> {
        Ok(self.read_transaction()?.get(hash).cloned())
    }

    /// Look up specs by their hash, or a prefix of it.
    pub fn get_by_hash(
        &self,
        prefix: &str,
        installed: &InstallStatuses,
    ) -> Result<Vec<ConcreteSpec>> {
        Ok(self.read_transaction()?.get_by_hash(prefix, installed))
    }

    pub fn get_record(&self, hash: &DagHash) -> Result<InstallRecord> {
        self.query_local_by_spec_hash(hash)?
            .ok_or_else(|| Error::NoSuchRecord(hash.to_string()))
    }

    pub fn check_ref_counts(&self) -> Result<()> {
        self.read_transaction()?.check_ref_counts()
    }

    /// Rebuild the index from the metadata in every install prefix.
    ///
    /// Whether each spec was installed explicitly, and when, is taken
    /// from the previous index if it can still be read. Prefixes that
    /// can not be read are left out and listed in the report.
    pub fn reindex(&self) -> Result<ReindexReport> {
        let Some(layout) = &self.layout else {
            return Err(Error::String(
                "cannot reindex a database without a directory layout".to_owned(),
            ));
        };
        let lock = self.lock(LockKind::Exclusive)?;
        let old = match self.read_index() {
            Ok(old) => old.unwrap_or_default(),
            Err(err) => {
                tracing::warn!("ignoring the previous database index: {err}");
                Index::default()
            }
        };
        let previous = |hash: &DagHash| {
            old.get(hash)
                .map(|record| (record.explicit, Some(record.installation_time)))
        };

        let scan = layout.scan()?;
        let mut report = ReindexReport {
            skipped: scan.skipped,
            ..Default::default()
        };
        let mut index = Index::new();
        for prefix in scan.installed {
            tracing::debug!(prefix = %prefix.path.display(), "reindexing");
            let (explicit, time) = previous(prefix.spec.dag_hash())
                .unwrap_or((true, prefix.modified.or_else(|| Some(Utc::now()))));
            index.add(&prefix.spec, Some(layout), explicit, time)?;
            report.installed += 1;
        }
        for deprecated in scan.deprecated {
            let (explicit, time) = previous(deprecated.spec.dag_hash())
                .unwrap_or((true, deprecated.modified));
            index.add(&deprecated.spec, Some(layout), explicit, time)?;
            index.deprecate(&deprecated.spec, &deprecated.deprecator)?;
            report.deprecated += 1;
        }
        for record in old.records() {
            if index.get(record.spec.dag_hash()).is_some() {
                continue;
            }
            let still_installed = record.spec.is_external()
                || matches!(layout.check_installed(&record.spec), Ok(Some(_)));
            if !still_installed {
                tracing::debug!(spec = %record.spec.format_node(), "dropping record of uninstalled spec");
                continue;
            }
            index.add(
                &record.spec,
                Some(layout),
                record.explicit,
                Some(record.installation_time),
            )?;
            report.recovered += 1;
        }
        index.check_ref_counts()?;

        let transaction = WriteTransaction {
            db: self,
            _lock: lock,
            index,
            committed: false,
        };
        transaction.commit()?;
        tracing::info!(
            installed = report.installed,
            deprecated = report.deprecated,
            recovered = report.recovered,
            skipped = report.skipped.len(),
            "reindexed database"
        );
        Ok(report)
    }
}

/// A consistent view of the index, held under a shared lock.
#[derive(Debug)]
pub struct ReadTransaction {
    _lock: DatabaseLock,
    index: Index,
}

impl Deref for ReadTransaction {
    type Target = Index;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

/// A working copy of the index, held under an exclusive lock.
///
/// Dropping the transaction without committing it discards every
/// change.
#[derive(Debug)]
pub struct WriteTransaction<'db> {
    db: &'db Database,
    _lock: DatabaseLock,
    index: Index,
    committed: bool,
}

impl WriteTransaction<'_> {
    /// Save the working copy as the new index.
    pub fn commit(mut self) -> Result<()> {
        self.db.write_index(&self.index)?;
        self.committed = true;
        Ok(())
    }
}

impl Deref for WriteTransaction<'_> {
    type Target = Index;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

impl DerefMut for WriteTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.index
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(path = %self.db.index_path.display(), "discarding uncommitted database changes");
        }
    }
}
