// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::Result;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

static CONFIG: OnceCell<RwLock<Arc<Config>>> = OnceCell::new();

/// The name under which package-wide defaults are configured.
pub const ALL_PACKAGES: &str = "all";

/// Paths to the executables of a configured compiler.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerPaths {
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
    pub f77: Option<PathBuf>,
    pub fc: Option<PathBuf>,
}

/// One entry of the `compilers` list.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerEntry {
    /// The compiler and its version, eg: `gcc@=10.2.1`
    pub spec: String,
    pub operating_system: String,
    pub target: String,
    pub paths: CompilerPaths,
    /// Environment modules that must be loaded to use this compiler.
    pub modules: Vec<String>,
}

/// A pre-existing installation that can stand in for a package.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExternalEntry {
    /// The concrete description of the installation, eg: `quantum-espresso@1.0~veritas`
    pub spec: String,
    pub prefix: PathBuf,
}

/// Per package settings, also used under the `all` key for every package.
#[derive(Clone, Default, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageSettings {
    /// When false, only externals can satisfy this package.
    pub buildable: Option<bool>,
    pub externals: Vec<ExternalEntry>,
    /// Preferred version constraints, best first.
    pub version: Vec<String>,
    /// Preferred variant values, written as spec text, eg: `+mpi~debug`
    pub variants: Option<String>,
    /// Preferred compilers, best first.
    pub compiler: Vec<String>,
    /// Preferred providers for each virtual package, best first.
    pub providers: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Concretizer {
    /// Prefer installed specs that are compatible with the request.
    pub reuse: bool,

    /// Allow requests to pin compilers that are not yet configured,
    /// so that they can be built along the way.
    pub bootstrap_compilers: bool,

    /// Consider deprecated versions even when no request pins them.
    pub allow_deprecated: bool,

    /// The maximum number of decisions a single solve may make
    /// before it is interrupted.
    pub max_steps: u64,
}

impl Default for Concretizer {
    fn default() -> Self {
        Self {
            reuse: false,
            bootstrap_compilers: false,
            allow_deprecated: false,
            max_steps: 100_000,
        }
    }
}

/// The default architecture for nodes that do not request one.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Host {
    pub platform: String,
    pub os: String,
    pub target: String,
}

impl Default for Host {
    fn default() -> Self {
        Self::detect()
    }
}

impl Host {
    /// Describe the machine that this process is running on.
    pub fn detect() -> Self {
        Self {
            platform: std::env::consts::OS.to_owned(),
            os: detect_os().unwrap_or_else(|| "unknown".to_owned()),
            target: std::env::consts::ARCH.to_owned(),
        }
    }
}

/// Read the distribution id and version, eg: `ubuntu22.04`
fn detect_os() -> Option<String> {
    let release = std::fs::read_to_string("/etc/os-release").ok()?;
    let field = |key: &str| {
        release.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.trim_matches('"').to_owned())
        })
    };
    let id = field("ID")?;
    let version = field("VERSION_ID").unwrap_or_default();
    let os: String = format!("{id}{version}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect();
    (!os.is_empty()).then_some(os)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Store {
    /// The directory holding every installation and the database.
    pub root: PathBuf,

    /// How long to wait for another process to release the
    /// database lock before giving up.
    pub lock_timeout_seconds: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("hpk"),
            lock_timeout_seconds: 120,
        }
    }
}

/// Configuration values for hpk.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    // Sections other than the lists and maps below should aim to only
    // have one level of values within them, otherwise they become
    // impossible to address with environment variables.
    pub compilers: Vec<CompilerEntry>,
    pub packages: BTreeMap<String, PackageSettings>,
    pub concretizer: Concretizer,
    pub host: Host,
    pub store: Store,
}

impl Config {
    /// Get the current loaded config, loading it if needed
    pub fn current() -> Result<Arc<Self>> {
        get_config()
    }

    /// Load the config from disk, even if it's already been loaded before
    pub fn load() -> Result<Self> {
        load_config()
    }

    /// Read a config from yaml text, on top of the defaults.
    pub fn from_yaml<S: AsRef<str>>(source: S) -> Result<Self> {
        use config::{Config as RawConfig, File, FileFormat};

        let config = RawConfig::builder()
            .add_source(File::from_str(source.as_ref(), FileFormat::Yaml))
            .build()?;
        Ok(Config::deserialize(config)?)
    }

    /// Make this config the current global one
    pub fn make_current(self) -> Result<Arc<Self>> {
        // Note we don't know if we won the race to set the value here,
        // so we still need to try to update it.
        let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
            Ok(RwLock::new(Arc::new(self.clone())))
        })?;

        let mut lock = config
            .write()
            .map_err(|err| crate::Error::LockPoisonedWrite(err.to_string()))?;
        *Arc::make_mut(&mut lock) = self;
        Ok(Arc::clone(&lock))
    }

    /// The settings of one package, without the package-wide defaults.
    pub fn package(&self, name: &str) -> Option<&PackageSettings> {
        self.packages.get(name)
    }

    fn all_packages(&self) -> Option<&PackageSettings> {
        self.packages.get(ALL_PACKAGES)
    }

    /// Whether the package may be built rather than taken from an external.
    pub fn is_buildable(&self, name: &str) -> bool {
        self.package(name)
            .and_then(|p| p.buildable)
            .or_else(|| self.all_packages().and_then(|p| p.buildable))
            .unwrap_or(true)
    }

    /// The configured externals for a package, in configuration order.
    pub fn externals(&self, name: &str) -> &[ExternalEntry] {
        self.package(name)
            .map(|p| p.externals.as_slice())
            .unwrap_or_default()
    }

    /// Preferred version constraints for a package, best first.
    pub fn version_preferences(&self, name: &str) -> &[String] {
        self.package(name)
            .map(|p| p.version.as_slice())
            .unwrap_or_default()
    }

    /// Preferred variant values for a package, falling back to
    /// the package-wide preference.
    pub fn variant_preferences(&self, name: &str) -> Option<&str> {
        self.package(name)
            .and_then(|p| p.variants.as_deref())
            .or_else(|| self.all_packages().and_then(|p| p.variants.as_deref()))
    }

    /// Preferred compilers for a package, falling back to
    /// the package-wide preference.
    pub fn compiler_preferences(&self, name: &str) -> &[String] {
        match self.package(name) {
            Some(p) if !p.compiler.is_empty() => &p.compiler,
            _ => self
                .all_packages()
                .map(|p| p.compiler.as_slice())
                .unwrap_or_default(),
        }
    }

    /// Preferred providers of a virtual package, best first.
    pub fn provider_preferences(&self, virtual_name: &str) -> &[String] {
        self.all_packages()
            .and_then(|p| p.providers.get(virtual_name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Get the current hpk config, fetching it from disk if needed.
pub fn get_config() -> Result<Arc<Config>> {
    let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
        Ok(RwLock::new(Arc::new(load_config()?)))
    })?;
    let lock = config
        .read()
        .map_err(|err| crate::Error::LockPoisonedRead(err.to_string()))?;
    Ok(Arc::clone(&*lock))
}

/// Load the hpk configuration from disk, even if it has already been loaded.
///
/// This includes the default, user, and system configurations (if they exist).
pub fn load_config() -> Result<Config> {
    use config::{Config as RawConfig, File};

    let mut config_builder = RawConfig::builder()
        // the system config can also be in any support format: toml, yaml, json, ini, etc
        .add_source(File::with_name("/etc/hpk").required(false));

    if let Some(user_config_dir) = dirs::config_dir() {
        let user_config = user_config_dir.join("hpk").join("hpk");
        // the user config can also be in any support format: toml, yaml, json, ini, etc
        config_builder = config_builder
            .add_source(File::with_name(&format!("{}", user_config.display())).required(false));
    }

    for (var, value) in std::env::vars() {
        let Some(tail) = var.strip_prefix("HPK_") else {
            continue;
        };
        let Some((section, name)) = tail.split_once('_') else {
            // typically, a value with no section is not a configuration
            // value, and can be skipped (eg: HPK_LOG)
            continue;
        };

        let key = format!("{}.{}", section.to_lowercase(), name.to_lowercase());
        config_builder = config_builder.set_override(key, value)?;
    }

    let config = config_builder.build()?;
    Ok(Config::deserialize(config)?)
}
