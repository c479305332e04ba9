// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{Error, Package, PkgName, Result};

#[cfg(test)]
#[path = "./repository_test.rs"]
mod repository_test;

/// The file holding a package definition within its directory.
pub const PACKAGE_FILE: &str = "package.yaml";
const PACKAGES_DIR: &str = "packages";

/// A source of package definitions.
pub trait Repository: Send + Sync {
    /// A short name identifying this repository in messages.
    fn name(&self) -> &str;

    /// Load the definition of a package.
    ///
    /// Fails with [`Error::PackageNotFound`] if this repository
    /// does not define it.
    fn get_package(&self, name: &str) -> Result<Arc<Package>>;

    /// The names of every package defined here, sorted.
    fn list_packages(&self) -> Result<Vec<PkgName>>;

    fn has_package(&self, name: &str) -> Result<bool> {
        match self.get_package(name) {
            Ok(_) => Ok(true),
            Err(err) if err.is_package_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Every package that declares that it provides the named virtual, by name.
    fn providers_for(&self, virtual_name: &str) -> Result<Vec<Arc<Package>>> {
        let mut providers = Vec::new();
        for name in self.list_packages()? {
            let package = self.get_package(&name)?;
            if package.provides.iter().any(|p| p.name() == virtual_name) {
                providers.push(package);
            }
        }
        Ok(providers)
    }

    /// True if the name is only ever provided and never defined.
    fn is_virtual(&self, name: &str) -> Result<bool> {
        if self.has_package(name)? {
            return Ok(false);
        }
        Ok(!self.providers_for(name)?.is_empty())
    }
}

impl<T: Repository + ?Sized> Repository for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_package(&self, name: &str) -> Result<Arc<Package>> {
        (**self).get_package(name)
    }

    fn list_packages(&self) -> Result<Vec<PkgName>> {
        (**self).list_packages()
    }

    fn has_package(&self, name: &str) -> Result<bool> {
        (**self).has_package(name)
    }

    fn providers_for(&self, virtual_name: &str) -> Result<Vec<Arc<Package>>> {
        (**self).providers_for(virtual_name)
    }

    fn is_virtual(&self, name: &str) -> Result<bool> {
        (**self).is_virtual(name)
    }
}

fn not_found(name: &str) -> Error {
    match PkgName::new(name) {
        Ok(name) => Error::PackageNotFound(name),
        Err(err) => err.into(),
    }
}

/// A repository held entirely in memory, mostly for testing.
#[derive(Debug, Default)]
pub struct MemRepository {
    packages: DashMap<PkgName, Arc<Package>>,
}

impl MemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a package definition.
    pub fn publish(&self, package: Package) {
        self.packages
            .insert(package.name.clone(), Arc::new(package));
    }
}

impl Repository for MemRepository {
    fn name(&self) -> &str {
        "mem"
    }

    fn get_package(&self, name: &str) -> Result<Arc<Package>> {
        self.packages
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| not_found(name))
    }

    fn list_packages(&self) -> Result<Vec<PkgName>> {
        let mut names: Vec<_> = self.packages.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

/// A repository on disk, with one `packages/<name>/package.yaml` per package.
///
/// Definitions are read on first use and cached afterwards.
#[derive(Debug)]
pub struct DirRepository {
    name: String,
    root: PathBuf,
    cache: DashMap<PkgName, Arc<Package>>,
}

impl DirRepository {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, root: P) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_file(&self, name: &PkgName) -> PathBuf {
        self.root
            .join(PACKAGES_DIR)
            .join(name.as_str())
            .join(PACKAGE_FILE)
    }

    /// Write a package definition into this repository.
    pub fn publish(&self, package: &Package) -> Result<()> {
        let path = self.package_file(&package.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| Error::FileOpenError(parent.to_owned(), err))?;
        }
        let yaml = serde_yaml::to_string(package)
            .map_err(|err| Error::InvalidPackageFile(path.clone(), err))?;
        std::fs::write(&path, yaml).map_err(|err| Error::FileOpenError(path.clone(), err))?;
        self.cache.remove(&package.name);
        Ok(())
    }
}

impl Repository for DirRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_package(&self, name: &str) -> Result<Arc<Package>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Arc::clone(cached.value()));
        }
        let pkg_name = PkgName::new(name)?;
        let path = self.package_file(&pkg_name);
        if !path.is_file() {
            return Err(Error::PackageNotFound(pkg_name));
        }
        tracing::trace!(path = %path.display(), "loading package");
        let package = Package::from_file(&path)?;
        if package.name != pkg_name {
            return Err(Error::InvalidPackage(
                pkg_name,
                format!("{} defines package {}", path.display(), package.name),
            ));
        }
        let package = Arc::new(package);
        self.cache.insert(pkg_name, Arc::clone(&package));
        Ok(package)
    }

    fn list_packages(&self) -> Result<Vec<PkgName>> {
        let dir = self.root.join(PACKAGES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&dir).map_err(|err| Error::ReadDirError(dir.clone(), err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::ReadDirError(dir.clone(), err))?;
            if !entry.path().join(PACKAGE_FILE).is_file() {
                continue;
            }
            let file_name = entry.file_name();
            match PkgName::new(file_name.to_string_lossy()) {
                Ok(name) => names.push(name),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), "skipping package directory: {err}");
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An ordered set of repositories, searched first to last.
#[derive(Default)]
pub struct RepoPath {
    repos: Vec<Arc<dyn Repository>>,
}

impl RepoPath {
    pub fn new(repos: Vec<Arc<dyn Repository>>) -> Self {
        Self { repos }
    }

    pub fn push<R: Repository + 'static>(&mut self, repo: R) {
        self.repos.push(Arc::new(repo));
    }

    pub fn repos(&self) -> &[Arc<dyn Repository>] {
        &self.repos
    }
}

impl Repository for RepoPath {
    fn name(&self) -> &str {
        "path"
    }

    fn get_package(&self, name: &str) -> Result<Arc<Package>> {
        for repo in self.repos.iter() {
            match repo.get_package(name) {
                Err(err) if err.is_package_not_found() => continue,
                res => return res,
            }
        }
        Err(not_found(name))
    }

    fn list_packages(&self) -> Result<Vec<PkgName>> {
        let mut names = Vec::new();
        for repo in self.repos.iter() {
            names.extend(repo.list_packages()?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}
