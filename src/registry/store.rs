//! File-backed registry store
//!
//! The store owns one `Registry` behind a read/write lock and mirrors it to
//! four JSON documents in the state directory. Writers hold the write lock
//! for the whole apply, including the index rebuild and the flush, so
//! readers never observe a partially applied changeset.
//!
//! The lock only serializes callers inside one process. Two processes
//! writing the same state directory can still lose updates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use alloy::primitives::Address;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::filter::{DeploymentFilter, SafeTransactionFilter, TransactionFilter};
use super::Registry;
use crate::changeset::{Changeset, ChangesetBuilder};
use crate::config::{BuildContext, RegistryConfig, DEPLOYMENTS_FILE, LOOKUP_FILE, SAFE_TXS_FILE, TRANSACTIONS_FILE};
use crate::errors::StoreError;
use crate::parser::ScriptExecution;
use crate::traits::RegistryView;
use crate::types::{Deployment, SafeTransaction, Transaction, VerificationInfo};

/// Thread-safe, file-backed registry
#[derive(Debug)]
pub struct RegistryStore {
    config: RegistryConfig,
    registry: RwLock<Registry>,
}

impl RegistryStore {
    /// Opens the registry in `config.state_dir`
    ///
    /// Missing documents are treated as empty; a document that exists but
    /// does not parse is an error.
    pub fn open(config: RegistryConfig) -> Result<Self, StoreError> {
        let deployments = read_document(&config.file(DEPLOYMENTS_FILE))?;
        let transactions = read_document(&config.file(TRANSACTIONS_FILE))?;
        let safe_transactions = read_document(&config.file(SAFE_TXS_FILE))?;
        let registry = Registry::from_parts(deployments, transactions, safe_transactions)?;

        debug!(
            state_dir = %config.state_dir.display(),
            deployments = registry.deployments.len(),
            transactions = registry.transactions.len(),
            safe_transactions = registry.safe_transactions.len(),
            "registry loaded"
        );
        Ok(Self {
            config,
            registry: RwLock::new(registry),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Applies a changeset and rewrites all four documents
    ///
    /// Works on a copy of the registry; the copy replaces the live state
    /// only after every document was written. On error neither memory nor
    /// disk changes.
    pub fn apply(&self, changeset: &Changeset) -> Result<(), StoreError> {
        let mut guard = self.registry.write().map_err(|_| StoreError::LockPoisoned)?;
        self.commit(&mut guard, changeset)?;

        info!(
            created = changeset.create.len(),
            updated = changeset.update.len(),
            deleted = changeset.delete.len(),
            "changeset applied"
        );
        Ok(())
    }

    /// Builds the changeset for a parsed execution and applies it
    ///
    /// Both steps run under the write lock, so the snapshot used for ID
    /// assignment is the one the changeset is applied to.
    pub fn record_execution(&self, execution: &ScriptExecution, ctx: &BuildContext) -> Result<Changeset, StoreError> {
        let mut guard = self.registry.write().map_err(|_| StoreError::LockPoisoned)?;

        let changeset = ChangesetBuilder::new(&*guard, ctx).build(execution);
        self.commit(&mut guard, &changeset)?;

        info!(
            chain_id = execution.chain_id,
            created = changeset.create.len(),
            updated = changeset.update.len(),
            "execution recorded"
        );
        Ok(changeset)
    }

    /// Recomputes the derived indexes from the source maps
    pub fn rebuild_indexes(&self) -> Result<(), StoreError> {
        let mut guard = self.registry.write().map_err(|_| StoreError::LockPoisoned)?;
        guard.rebuild_indexes()
    }

    /// Owned copy of the full registry
    pub fn snapshot(&self) -> Registry {
        self.read().clone()
    }

    pub fn get_deployment(&self, id: &str) -> Option<Deployment> {
        self.read().deployments.get(id).cloned()
    }

    pub fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.read().transactions.get(id).cloned()
    }

    /// Looks up a Safe transaction by its `0x`-prefixed hash
    pub fn get_safe_transaction(&self, safe_tx_hash: &str) -> Option<SafeTransaction> {
        self.read().safe_transactions.get(&safe_tx_hash.to_lowercase()).cloned()
    }

    pub fn get_deployment_by_address(&self, chain_id: u64, address: &Address) -> Option<Deployment> {
        self.read().deployment_by_address(chain_id, address).cloned()
    }

    pub fn list_deployments(&self, filter: &DeploymentFilter) -> Vec<Deployment> {
        let registry = self.read();
        registry
            .deployments
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    pub fn list_transactions(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        let registry = self.read();
        registry
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect()
    }

    pub fn list_safe_transactions(&self, filter: &SafeTransactionFilter) -> Vec<SafeTransaction> {
        let registry = self.read();
        registry
            .safe_transactions
            .values()
            .filter(|safe_tx| filter.matches(safe_tx))
            .cloned()
            .collect()
    }

    /// Deployments of a namespace on a chain, in creation order
    pub fn deployments_in_namespace(&self, namespace: &str, chain_id: u64) -> Vec<Deployment> {
        let registry = self.read();
        registry
            .indexes()
            .by_namespace
            .get(namespace)
            .and_then(|chains| chains.get(&chain_id))
            .map(|ids| ids.iter().filter_map(|id| registry.deployments.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Proxies pointing at the given implementation deployment
    pub fn proxies_of(&self, implementation_id: &str) -> Vec<Deployment> {
        let registry = self.read();
        registry
            .indexes()
            .proxies
            .implementations
            .get(implementation_id)
            .map(|ids| ids.iter().filter_map(|id| registry.deployments.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Implementation address recorded for a proxy deployment
    pub fn implementation_of(&self, proxy_id: &str) -> Option<Address> {
        self.read().indexes().proxies.proxy_to_impl.get(proxy_id).copied()
    }

    /// Safe transactions still awaiting execution
    pub fn pending_safe_transactions(&self) -> Vec<SafeTransaction> {
        let registry = self.read();
        registry
            .indexes()
            .pending_safe
            .iter()
            .filter_map(|key| registry.safe_transactions.get(key).cloned())
            .collect()
    }

    /// Adds a tag to a deployment; adding an existing tag is a no-op
    pub fn add_tag(&self, id: &str, tag: &str) -> Result<(), StoreError> {
        self.update_deployment(id, |deployment| {
            if deployment.tags.iter().any(|t| t == tag) {
                return false;
            }
            deployment.tags.push(tag.to_string());
            true
        })
    }

    /// Removes a tag from a deployment; removing a missing tag is a no-op
    pub fn remove_tag(&self, id: &str, tag: &str) -> Result<(), StoreError> {
        self.update_deployment(id, |deployment| {
            let before = deployment.tags.len();
            deployment.tags.retain(|t| t != tag);
            deployment.tags.len() != before
        })
    }

    /// Records the outcome of an explorer verification
    pub fn update_verification(&self, id: &str, verification: VerificationInfo) -> Result<(), StoreError> {
        self.update_deployment(id, |deployment| {
            deployment.verification = verification;
            true
        })
    }

    /// Applies `edit` to a copy of the deployment as a one-item update
    ///
    /// The read, the edit and the write share one write guard, so concurrent
    /// edits of the same deployment serialize instead of overwriting.
    fn update_deployment<F>(&self, id: &str, edit: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Deployment) -> bool,
    {
        let mut guard = self.registry.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut deployment = guard.deployments.get(id).cloned().ok_or_else(|| StoreError::UnknownEntry {
            kind: "deployment",
            id: id.to_string(),
        })?;
        if !edit(&mut deployment) {
            return Ok(());
        }
        deployment.updated_at = Utc::now();

        let mut changeset = Changeset::new();
        changeset.update.deployments.push(deployment);
        self.commit(&mut guard, &changeset)?;
        debug!(id, "deployment edited");
        Ok(())
    }

    /// Applies `changeset` to a copy of `live`, flushes it, then swaps it in
    fn commit(&self, live: &mut Registry, changeset: &Changeset) -> Result<(), StoreError> {
        let mut next = live.clone();
        next.apply(changeset)?;
        self.flush(&next)?;
        *live = next;
        Ok(())
    }

    /// Read access; the registry is only ever replaced wholesale, so a
    /// poisoned lock still guards a consistent value
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the four documents to temporary siblings, then renames them
    fn flush(&self, registry: &Registry) -> Result<(), StoreError> {
        let dir = &self.config.state_dir;
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let documents = [
            (DEPLOYMENTS_FILE, to_json(&registry.deployments)?),
            (TRANSACTIONS_FILE, to_json(&registry.transactions)?),
            (SAFE_TXS_FILE, to_json(&registry.safe_transactions)?),
            (LOOKUP_FILE, to_json(&registry.lookup_table())?),
        ];

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(documents.len());
        for (name, contents) in &documents {
            let target = self.config.file(name);
            let tmp = tmp_path(&target);
            if let Err(source) = fs::write(&tmp, contents) {
                discard(&staged);
                return Err(StoreError::Io { path: tmp, source });
            }
            staged.push((tmp, target));
        }

        for (i, (tmp, target)) in staged.iter().enumerate() {
            if let Err(source) = fs::rename(tmp, target) {
                if i > 0 {
                    warn!(
                        renamed = i,
                        failed = %target.display(),
                        "registry documents partially replaced; disk is ahead of memory until the next flush"
                    );
                }
                discard(&staged[i..]);
                return Err(StoreError::Io {
                    path: target.clone(),
                    source,
                });
            }
        }
        Ok(())
    }
}

impl RegistryView for RegistryStore {
    fn has_deployment(&self, id: &str) -> bool {
        self.read().deployments.contains_key(id)
    }

    fn deployment_at(&self, chain_id: u64, address: &Address) -> Option<String> {
        self.read().deployment_at(chain_id, address)
    }

    fn transaction(&self, id: &str) -> Option<Transaction> {
        self.get_transaction(id)
    }

    fn safe_transaction(&self, key: &str) -> Option<SafeTransaction> {
        self.get_safe_transaction(key)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>, StoreError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(StoreError::Serialize)
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(err) = fs::remove_file(tmp) {
            warn!(path = %tmp.display(), %err, "failed to remove temporary registry file");
        }
    }
}
