//! Contract metadata lookup for deployment records
//!
//! Provides two [`ContractIndex`] implementations:
//! - [`InMemoryContractIndex`]: populated explicitly, used by embedders and tests
//! - [`ArtifactIndex`]: built by scanning the compiler's output directory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::{hex, keccak256, B256};
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::traits::{ContractIndex, ContractInfo};

/// Contract index filled by explicit registration
#[derive(Debug, Clone, Default)]
pub struct InMemoryContractIndex {
    by_hash: HashMap<B256, ContractInfo>,
    by_artifact: HashMap<String, ContractInfo>,
    /// Contract name → artifact identifiers declaring it
    by_name: HashMap<String, Vec<String>>,
}

impl InMemoryContractIndex {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a contract under its artifact identifier
    ///
    /// # Arguments
    /// * `artifact` - Identifier such as `src/Counter.sol:Counter`
    /// * `bytecode_hash` - keccak256 of the creation bytecode, when known
    /// * `info` - Metadata returned by lookups
    pub fn insert(&mut self, artifact: impl Into<String>, bytecode_hash: Option<B256>, info: ContractInfo) {
        let artifact = artifact.into();
        if let Some(hash) = bytecode_hash {
            self.by_hash.insert(hash, info.clone());
        }
        let names = self.by_name.entry(info.name.clone()).or_default();
        if !names.contains(&artifact) {
            names.push(artifact.clone());
        }
        self.by_artifact.insert(artifact, info);
    }

    pub fn len(&self) -> usize {
        self.by_artifact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_artifact.is_empty()
    }
}

impl ContractIndex for InMemoryContractIndex {
    fn by_bytecode_hash(&self, hash: B256) -> Option<ContractInfo> {
        self.by_hash.get(&hash).cloned()
    }

    /// Exact identifier first, then the bare contract name if it is unambiguous
    fn by_artifact(&self, artifact: &str) -> Option<ContractInfo> {
        if let Some(info) = self.by_artifact.get(artifact) {
            return Some(info.clone());
        }
        let name = artifact.rsplit(':').next()?;
        match self.by_name.get(name)?.as_slice() {
            [only] => self.by_artifact.get(only).cloned(),
            _ => None,
        }
    }
}

/// Index over a compiler output directory (`out/<File>.sol/<Contract>.json`)
#[derive(Debug, Clone)]
pub struct ArtifactIndex {
    root: PathBuf,
    index: InMemoryContractIndex,
}

impl ArtifactIndex {
    /// Scans `out_dir` recursively for contract artifacts
    ///
    /// Files that are not contract artifacts (build info, caches, JSON that
    /// does not parse) are skipped. Only filesystem errors abort the scan.
    pub fn from_out_dir(out_dir: impl AsRef<Path>) -> Result<Self> {
        let root = out_dir.as_ref().to_path_buf();
        let mut index = InMemoryContractIndex::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("Failed to read entry in {}", dir.display()))?
                    .path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|name| name == "build-info") {
                        continue;
                    }
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    let contents = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
                    match parse_artifact(&contents) {
                        Some((artifact, hash, info)) => index.insert(artifact, hash, info),
                        None => debug!(path = %path.display(), "skipping non-contract artifact"),
                    }
                }
            }
        }

        debug!(root = %root.display(), contracts = index.len(), "artifact index built");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl ContractIndex for ArtifactIndex {
    fn by_bytecode_hash(&self, hash: B256) -> Option<ContractInfo> {
        self.index.by_bytecode_hash(hash)
    }

    fn by_artifact(&self, artifact: &str) -> Option<ContractInfo> {
        self.index.by_artifact(artifact)
    }
}

/// Extracts identifier, bytecode hash and metadata from one artifact file
fn parse_artifact(contents: &str) -> Option<(String, Option<B256>, ContractInfo)> {
    let json: Value = serde_json::from_str(contents).ok()?;
    let metadata = json.get("metadata")?;

    let (source_path, name) = metadata
        .pointer("/settings/compilationTarget")?
        .as_object()?
        .iter()
        .next()
        .and_then(|(path, name)| Some((path.clone(), name.as_str()?.to_string())))?;

    let compiler_version = metadata
        .pointer("/compiler/version")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // Unlinked bytecode contains placeholders and is not valid hex
    let bytecode_hash = json
        .pointer("/bytecode/object")
        .and_then(Value::as_str)
        .and_then(|object| hex::decode(object).ok())
        .filter(|code| !code.is_empty())
        .map(keccak256);

    let is_library = json
        .pointer("/ast/nodes")
        .and_then(Value::as_array)
        .is_some_and(|nodes| {
            nodes.iter().any(|node| {
                node.get("nodeType").and_then(Value::as_str) == Some("ContractDefinition")
                    && node.get("name").and_then(Value::as_str) == Some(name.as_str())
                    && node.get("contractKind").and_then(Value::as_str) == Some("library")
            })
        });

    let artifact = format!("{}:{}", source_path, name);
    Some((
        artifact,
        bytecode_hash,
        ContractInfo {
            name,
            source_path,
            compiler_version,
            is_library,
        },
    ))
}
