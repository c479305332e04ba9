// Copyright (c) Contributors to the HPK project.
// SPDX-License-Identifier: Apache-2.0
// https://hpk.dev

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::arch::Arch;
use crate::foundation::compiler::CompilerSpec;
use crate::foundation::variant::VariantMap;
use crate::foundation::version::Version;
use crate::{Error, NodeAttrs, NodeSpec, PkgName, Result, Spec};

#[cfg(test)]
#[path = "./concrete_test.rs"]
mod concrete_test;

/// The number of characters kept from the encoded digest.
pub const DAG_HASH_LEN: usize = 32;
pub const SHORT_HASH_LEN: usize = 7;
const NODE_LIST_VERSION: u32 = 1;

/// The content hash of a concrete spec and all of its dependencies.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DagHash(String);

impl DagHash {
    pub fn new<S: Into<String>>(value: S) -> Result<Self> {
        let value = value.into();
        let valid = value.len() == DAG_HASH_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c));
        if !valid {
            return Err(Error::String(format!("invalid dag hash: {value:?}")));
        }
        Ok(Self(value))
    }

    fn of_bytes(bytes: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA256, bytes);
        let mut encoded = data_encoding::BASE32_NOPAD.encode(digest.as_ref());
        encoded.truncate(DAG_HASH_LEN);
        Self(encoded.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The abbreviated form used in messages and paths.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_HASH_LEN]
    }
}

impl std::fmt::Display for DagHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DagHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DagHash> for String {
    fn from(value: DagHash) -> String {
        value.0
    }
}

/// How a dependency is needed by its dependent.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DepType {
    Build,
    Link,
    Run,
    Test,
}

impl DepType {
    /// The types assumed when a dependency does not declare any.
    pub fn defaults() -> BTreeSet<DepType> {
        BTreeSet::from([DepType::Build, DepType::Link])
    }
}

/// An edge from a concrete node to one of its dependencies.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyEdge {
    pub spec: ConcreteSpec,
    pub types: BTreeSet<DepType>,
    /// The virtual packages this dependency was chosen to provide.
    pub virtuals: BTreeSet<PkgName>,
}

/// A single, fully determined package in a concrete DAG.
#[derive(Debug)]
pub struct ConcreteNode {
    name: PkgName,
    version: Version,
    variants: VariantMap,
    compiler: CompilerSpec,
    arch: Arch,
    external: Option<PathBuf>,
    dependencies: Vec<DependencyEdge>,
    hash: DagHash,
}

impl ConcreteNode {
    pub fn name(&self) -> &PkgName {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn variants(&self) -> &VariantMap {
        &self.variants
    }

    pub fn compiler(&self) -> &CompilerSpec {
        &self.compiler
    }

    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    /// The prefix of the pre-existing installation, for externals.
    pub fn external(&self) -> Option<&Path> {
        self.external.as_deref()
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    /// Direct dependencies, ordered by name.
    pub fn dependencies(&self) -> &[DependencyEdge] {
        &self.dependencies
    }

    pub fn dag_hash(&self) -> &DagHash {
        &self.hash
    }

    pub fn short_hash(&self) -> &str {
        self.hash.short()
    }

    /// True if this node alone meets the given constraints.
    pub fn satisfies_node(&self, spec: &NodeSpec) -> bool {
        spec.is_satisfied_by(self)
    }

    /// Render this node alone, eg `fftw@1.0+mpi %gcc@10.2.1 arch=linux-ubuntu22.04-x86_64`.
    pub fn format_node(&self) -> String {
        format!(
            "{}@{}{} %{} arch={}",
            self.name, self.version, self.variants, self.compiler, self.arch
        )
    }

    fn to_record(&self, with_hash: bool) -> NodeRecord {
        NodeRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            variants: self.variants.clone(),
            compiler: self.compiler.clone(),
            arch: self.arch.clone(),
            external: self.external.clone(),
            dependencies: self
                .dependencies
                .iter()
                .map(|edge| EdgeRecord {
                    name: edge.spec.name.clone(),
                    hash: edge.spec.hash.clone(),
                    types: edge.types.clone(),
                    virtuals: edge.virtuals.clone(),
                })
                .collect(),
            hash: with_hash.then(|| self.hash.clone()),
        }
    }
}

impl NodeAttrs for ConcreteNode {
    fn node_name(&self) -> &PkgName {
        &self.name
    }

    fn node_version(&self) -> &Version {
        &self.version
    }

    fn node_variants(&self) -> &VariantMap {
        &self.variants
    }

    fn node_compiler(&self) -> &CompilerSpec {
        &self.compiler
    }

    fn node_arch(&self) -> &Arch {
        &self.arch
    }
}

/// A frozen, fully concrete spec DAG.
///
/// Cloning is cheap and shares the underlying nodes. Equality and
/// hashing use the [`DagHash`] only.
#[derive(Clone, Debug)]
pub struct ConcreteSpec(Arc<ConcreteNode>);

impl std::ops::Deref for ConcreteSpec {
    type Target = ConcreteNode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for ConcreteSpec {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ConcreteSpec {}

impl std::hash::Hash for ConcreteSpec {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state)
    }
}

impl PartialOrd for ConcreteSpec {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConcreteSpec {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.name, &self.version, &self.hash).cmp(&(&other.name, &other.version, &other.hash))
    }
}

impl ConcreteSpec {
    pub fn builder(
        name: PkgName,
        version: Version,
        compiler: CompilerSpec,
        arch: Arch,
    ) -> ConcreteSpecBuilder {
        ConcreteSpecBuilder::new(name, version, compiler, arch)
    }

    /// This node and every node below it, each once, parents first.
    pub fn traverse(&self) -> Vec<ConcreteSpec> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(spec) = stack.pop() {
            if !seen.insert(spec.hash.clone()) {
                continue;
            }
            for edge in spec.dependencies.iter().rev() {
                stack.push(edge.spec.clone());
            }
            out.push(spec);
        }
        out
    }

    /// Every node, children before their parents.
    pub fn traverse_post_order(&self) -> Vec<ConcreteSpec> {
        fn visit(spec: &ConcreteSpec, seen: &mut HashSet<DagHash>, out: &mut Vec<ConcreteSpec>) {
            if !seen.insert(spec.hash.clone()) {
                return;
            }
            for edge in spec.dependencies.iter() {
                visit(&edge.spec, seen, out);
            }
            out.push(spec.clone());
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        visit(self, &mut seen, &mut out);
        out
    }

    /// Find the node with the given name anywhere in this DAG.
    pub fn get(&self, name: &str) -> Option<ConcreteSpec> {
        self.traverse().into_iter().find(|s| s.name == name)
    }

    /// Find the node chosen to provide a virtual package.
    pub fn provider_of(&self, virtual_name: &str) -> Option<ConcreteSpec> {
        self.traverse().into_iter().find_map(|s| {
            s.dependencies
                .iter()
                .find(|e| e.virtuals.iter().any(|v| v == virtual_name))
                .map(|e| e.spec.clone())
        })
    }

    /// True if this DAG meets every constraint of an abstract spec.
    pub fn satisfies(&self, spec: &Spec) -> bool {
        if !self.satisfies_node(spec.root()) {
            return false;
        }
        spec.dependencies().iter().all(|dep| {
            let Some(name) = &dep.name else {
                return false;
            };
            if let Some(node) = self.get(name) {
                return node.satisfies_node(dep);
            }
            // a virtual can only be matched by name here
            dep.is_unconstrained() && self.provider_of(name).is_some()
        })
    }

    /// Serialize this DAG as a flat list of nodes, the root first.
    pub fn to_node_list(&self) -> NodeList {
        NodeList {
            spec: NodeListInner {
                meta: NodeListMeta {
                    version: NODE_LIST_VERSION,
                },
                nodes: self.traverse().iter().map(|s| s.to_record(true)).collect(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_node_list())?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str::<NodeList>(source)?.into_spec()
    }
}

impl std::fmt::Display for ConcreteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_node())?;
        for dep in self.traverse().iter().skip(1) {
            write!(f, " ^{}", dep.format_node())?;
        }
        Ok(())
    }
}

/// Assembles a [`ConcreteSpec`] node once all of its dependencies exist.
pub struct ConcreteSpecBuilder {
    name: PkgName,
    version: Version,
    variants: VariantMap,
    compiler: CompilerSpec,
    arch: Arch,
    external: Option<PathBuf>,
    dependencies: Vec<DependencyEdge>,
}

impl ConcreteSpecBuilder {
    pub fn new(name: PkgName, version: Version, compiler: CompilerSpec, arch: Arch) -> Self {
        Self {
            name,
            version,
            variants: VariantMap::default(),
            compiler,
            arch,
            external: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_variants(mut self, variants: VariantMap) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_external(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.external = Some(prefix.into());
        self
    }

    /// Add or extend the edge to `spec`.
    pub fn with_dependency(
        mut self,
        spec: ConcreteSpec,
        types: impl IntoIterator<Item = DepType>,
        virtuals: impl IntoIterator<Item = PkgName>,
    ) -> Self {
        match self.dependencies.iter_mut().find(|e| e.spec.name == spec.name) {
            Some(edge) => {
                edge.types.extend(types);
                edge.virtuals.extend(virtuals);
            }
            None => self.dependencies.push(DependencyEdge {
                spec,
                types: types.into_iter().collect(),
                virtuals: virtuals.into_iter().collect(),
            }),
        }
        self
    }

    pub fn build(mut self) -> Result<ConcreteSpec> {
        self.dependencies
            .sort_by(|a, b| a.spec.name.cmp(&b.spec.name));
        if let Some(pair) = self
            .dependencies
            .windows(2)
            .find(|pair| pair[0].spec.name == pair[1].spec.name)
        {
            return Err(Error::String(format!(
                "{} depends on two different {} nodes",
                self.name, pair[0].spec.name
            )));
        }
        let mut node = ConcreteNode {
            name: self.name,
            version: self.version,
            variants: self.variants,
            compiler: self.compiler,
            arch: self.arch,
            external: self.external,
            dependencies: self.dependencies,
            // replaced below, once the record can be serialized
            hash: DagHash(String::new()),
        };
        let canonical = serde_json::to_vec(&node.to_record(false))?;
        node.hash = DagHash::of_bytes(&canonical);
        Ok(ConcreteSpec(Arc::new(node)))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EdgeRecord {
    name: PkgName,
    hash: DagHash,
    types: BTreeSet<DepType>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    virtuals: BTreeSet<PkgName>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NodeRecord {
    name: PkgName,
    version: Version,
    #[serde(default)]
    variants: VariantMap,
    compiler: CompilerSpec,
    arch: Arch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<EdgeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<DagHash>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NodeListMeta {
    version: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NodeListInner {
    #[serde(rename = "_meta")]
    meta: NodeListMeta,
    nodes: Vec<NodeRecord>,
}

/// The serialized form of a concrete spec: every node once, with
/// dependencies referenced by hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeList {
    spec: NodeListInner,
}

impl NodeList {
    /// Rebuild the DAG, verifying every recorded hash.
    pub fn into_spec(self) -> Result<ConcreteSpec> {
        let Some(root) = self.spec.nodes.first() else {
            return Err(Error::String("spec node list is empty".to_owned()));
        };
        let root_hash = match &root.hash {
            Some(h) => h.clone(),
            None => return Err(Error::String("root node has no hash".to_owned())),
        };
        let records: HashMap<DagHash, NodeRecord> = self
            .spec
            .nodes
            .into_iter()
            .filter_map(|r| r.hash.clone().map(|h| (h, r)))
            .collect();
        let mut built = HashMap::new();
        build_from_records(&root_hash, &records, &mut built)
    }
}

fn build_from_records(
    hash: &DagHash,
    records: &HashMap<DagHash, NodeRecord>,
    built: &mut HashMap<DagHash, ConcreteSpec>,
) -> Result<ConcreteSpec> {
    if let Some(spec) = built.get(hash) {
        return Ok(spec.clone());
    }
    let record = records
        .get(hash)
        .ok_or_else(|| Error::MissingNode(hash.clone()))?;
    let mut builder = ConcreteSpecBuilder::new(
        record.name.clone(),
        record.version.clone(),
        record.compiler.clone(),
        record.arch.clone(),
    )
    .with_variants(record.variants.clone());
    if let Some(prefix) = &record.external {
        builder = builder.with_external(prefix.clone());
    }
    for edge in record.dependencies.iter() {
        let child = build_from_records(&edge.hash, records, built)?;
        builder = builder.with_dependency(child, edge.types.clone(), edge.virtuals.clone());
    }
    let spec = builder.build()?;
    if spec.dag_hash() != hash {
        return Err(Error::HashMismatch {
            name: record.name.clone(),
            recorded: hash.clone(),
            computed: spec.dag_hash().clone(),
        });
    }
    built.insert(hash.clone(), spec.clone());
    Ok(spec)
}
