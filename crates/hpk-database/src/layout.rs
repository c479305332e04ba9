// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hpk_schema::ConcreteSpec;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./layout_test.rs"]
mod layout_test;

/// The name of the metadata directory kept in every install prefix,
/// and at the root of the store for the database.
pub const METADATA_DIR: &str = ".hpk";
const SPEC_FILE: &str = "spec.json";
const DEPRECATED_DIR: &str = "deprecated";

/// An install prefix that could not be read back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedPrefix {
    pub path: PathBuf,
    pub reason: String,
}

/// A spec read back from its install prefix.
#[derive(Clone, Debug)]
pub struct InstalledPrefix {
    pub spec: ConcreteSpec,
    pub path: PathBuf,
    /// When the prefix was last changed.
    pub modified: Option<DateTime<Utc>>,
}

/// A deprecated spec, read back from the prefix of its deprecator.
#[derive(Clone, Debug)]
pub struct DeprecatedPrefix {
    pub spec: ConcreteSpec,
    pub deprecator: ConcreteSpec,
    pub modified: Option<DateTime<Utc>>,
}

/// Everything found under the store root.
#[derive(Clone, Debug, Default)]
pub struct LayoutScan {
    pub installed: Vec<InstalledPrefix>,
    pub deprecated: Vec<DeprecatedPrefix>,
    pub skipped: Vec<SkippedPrefix>,
}

/// Decides where each concrete spec is installed and how its
/// metadata is kept inside the prefix.
///
/// Prefixes look like:
/// `<root>/<platform>-<os>-<target>/<compiler>-<version>/<name>-<version>-<hash>`
#[derive(Clone, Debug)]
pub struct DirectoryLayout {
    root: PathBuf,
}

impl DirectoryLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The install prefix of a spec, or the existing installation
    /// that it refers to for externals.
    pub fn path_for_spec(&self, spec: &ConcreteSpec) -> PathBuf {
        if let Some(prefix) = spec.external() {
            return prefix.to_owned();
        }
        let compiler = spec.compiler();
        self.root
            .join(spec.arch().to_string())
            .join(format!("{}-{}", compiler.name, compiler.version))
            .join(format!(
                "{}-{}-{}",
                spec.name(),
                spec.version(),
                spec.dag_hash()
            ))
    }

    pub fn metadata_dir(&self, spec: &ConcreteSpec) -> PathBuf {
        self.path_for_spec(spec).join(METADATA_DIR)
    }

    pub fn spec_file_path(&self, spec: &ConcreteSpec) -> PathBuf {
        self.metadata_dir(spec).join(SPEC_FILE)
    }

    /// Where the metadata of `deprecated` is kept once it has been
    /// replaced by `deprecator`.
    pub fn deprecated_file_path(&self, deprecated: &ConcreteSpec, deprecator: &ConcreteSpec) -> PathBuf {
        self.metadata_dir(deprecator)
            .join(DEPRECATED_DIR)
            .join(format!("{}.json", deprecated.dag_hash()))
    }

    /// Create the prefix of a spec and record the spec inside of it.
    pub fn create_install_directory(&self, spec: &ConcreteSpec) -> Result<PathBuf> {
        let prefix = self.path_for_spec(spec);
        let metadata = self.metadata_dir(spec);
        std::fs::create_dir_all(&metadata)
            .map_err(|err| Error::DirectoryCreateError(metadata.clone(), err))?;
        write_spec(&self.spec_file_path(spec), spec)?;
        tracing::debug!(prefix = %prefix.display(), "created install prefix");
        Ok(prefix)
    }

    /// Confirm that a spec is installed where it should be.
    ///
    /// Returns the prefix, or `None` when nothing is installed there.
    /// A prefix holding some other spec is an error.
    pub fn check_installed(&self, spec: &ConcreteSpec) -> Result<Option<PathBuf>> {
        let prefix = self.path_for_spec(spec);
        if spec.is_external() {
            return Ok(prefix.exists().then_some(prefix));
        }
        let spec_file = self.spec_file_path(spec);
        let installed = match read_spec(&spec_file) {
            Ok(installed) => installed,
            Err(Error::FileOpenError(_, err)) if err.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if installed.dag_hash() != spec.dag_hash() {
            return Err(Error::InconsistentPrefix(
                prefix,
                format!("found {} instead", installed.format_node()),
            ));
        }
        Ok(Some(prefix))
    }

    /// Move the metadata of a deprecated spec into its deprecator's
    /// prefix, and remove the deprecated prefix.
    pub fn deprecate(&self, deprecated: &ConcreteSpec, deprecator: &ConcreteSpec) -> Result<()> {
        let target = self.deprecated_file_path(deprecated, deprecator);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::DirectoryCreateError(parent.to_owned(), err))?;
        }
        write_spec(&target, deprecated)?;
        self.remove_install_directory(deprecated)
    }

    /// Forget where a deprecated spec was kept, for when it is
    /// deprecated again in favor of another spec.
    pub fn remove_deprecated_file(&self, deprecated: &ConcreteSpec, deprecator: &ConcreteSpec) -> Result<()> {
        let path = self.deprecated_file_path(deprecated, deprecator);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::StorageWriteError("remove deprecated spec", path, err)),
        }
    }

    /// Remove the prefix of a spec, if there is one.
    pub fn remove_install_directory(&self, spec: &ConcreteSpec) -> Result<()> {
        if spec.is_external() {
            return Ok(());
        }
        let prefix = self.path_for_spec(spec);
        match std::fs::remove_dir_all(&prefix) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::StorageWriteError(
                "remove install prefix",
                prefix,
                err,
            )),
        }
    }

    /// Find the metadata of every installed and deprecated spec.
    ///
    /// Prefixes whose metadata is missing or unreadable are reported
    /// rather than failing the whole scan.
    pub fn scan(&self) -> Result<LayoutScan> {
        let mut scan = LayoutScan::default();
        for prefix in self.prefixes()? {
            let spec_file = prefix.join(METADATA_DIR).join(SPEC_FILE);
            let spec = match read_spec(&spec_file) {
                Ok(spec) => spec,
                Err(err) => {
                    tracing::warn!(prefix = %prefix.display(), "skipping install prefix: {err}");
                    scan.skipped.push(SkippedPrefix {
                        path: prefix,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if self.path_for_spec(&spec) != prefix {
                let reason = format!("holds metadata for {}", spec.format_node());
                tracing::warn!(prefix = %prefix.display(), "skipping install prefix: {reason}");
                scan.skipped.push(SkippedPrefix {
                    path: prefix,
                    reason,
                });
                continue;
            }
            let modified = modified_time(&prefix);

            for deprecated_file in deprecated_files(&prefix)? {
                match read_spec(&deprecated_file) {
                    Ok(deprecated) => scan.deprecated.push(DeprecatedPrefix {
                        spec: deprecated,
                        deprecator: spec.clone(),
                        modified: modified_time(&deprecated_file),
                    }),
                    Err(err) => {
                        tracing::warn!(file = %deprecated_file.display(), "skipping deprecated spec: {err}");
                        scan.skipped.push(SkippedPrefix {
                            path: deprecated_file,
                            reason: err.to_string(),
                        });
                    }
                }
            }
            scan.installed.push(InstalledPrefix {
                spec,
                path: prefix,
                modified,
            });
        }
        Ok(scan)
    }

    /// Every directory at the depth of an install prefix.
    fn prefixes(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.root.join("*").join("*").join("*");
        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..Default::default()
        };
        let mut prefixes = Vec::new();
        for entry in glob::glob_with(&pattern.to_string_lossy(), options)? {
            match entry {
                Ok(path) if path.is_dir() => prefixes.push(path),
                Ok(_) => {}
                Err(err) => {
                    let path = err.path().to_owned();
                    return Err(Error::ReadDirError(path, err.into()));
                }
            }
        }
        prefixes.sort();
        Ok(prefixes)
    }
}

fn deprecated_files(prefix: &Path) -> Result<Vec<PathBuf>> {
    let dir = prefix.join(METADATA_DIR).join(DEPRECATED_DIR);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(Error::ReadDirError(dir, err)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Error::ReadDirError(dir.clone(), err))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

pub(crate) fn read_spec(path: &Path) -> Result<ConcreteSpec> {
    let text = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::FileOpenError(path.to_owned(), err),
        _ => Error::FileReadError(path.to_owned(), err),
    })?;
    Ok(ConcreteSpec::from_json(&text)?)
}

fn write_spec(path: &Path, spec: &ConcreteSpec) -> Result<()> {
    std::fs::write(path, spec.to_json()?)
        .map_err(|err| Error::StorageWriteError("spec metadata", path.to_owned(), err))
}
