//! The persisted deployment registry
//!
//! This module provides:
//! - `Registry`: the three source maps plus their derived indexes
//! - `RegistryStore`: file-backed, lock-guarded access with atomic `apply`
//! - List filters for deployments, transactions and Safe transactions
//!
//! Source maps are keyed by deployment ID, transaction ID and Safe
//! transaction hash. Everything in [`LookupIndexes`] can be recomputed from
//! them at any time.

pub mod filter;
pub mod indexes;
mod store;

pub use filter::{DeploymentFilter, SafeTransactionFilter, TransactionFilter};
pub use indexes::{LookupIndexes, ProxyIndex};
pub use store::RegistryStore;

use std::collections::BTreeMap;

use alloy::primitives::Address;

use crate::changeset::Changeset;
use crate::errors::StoreError;
use crate::traits::RegistryView;
use crate::types::{Deployment, SafeTransaction, Transaction};

/// Chain ID → namespace → `{contract}:{label}` → address
///
/// The simplified table written to `registry.json` for script-side lookups.
pub type LookupTable = BTreeMap<u64, BTreeMap<String, BTreeMap<String, Address>>>;

/// Complete registry state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    pub deployments: BTreeMap<String, Deployment>,
    pub transactions: BTreeMap<String, Transaction>,
    pub safe_transactions: BTreeMap<String, SafeTransaction>,
    indexes: LookupIndexes,
}

impl Registry {
    /// Assembles a registry from its source maps
    pub fn from_parts(
        deployments: BTreeMap<String, Deployment>,
        transactions: BTreeMap<String, Transaction>,
        safe_transactions: BTreeMap<String, SafeTransaction>,
    ) -> Result<Self, StoreError> {
        let indexes = LookupIndexes::build(&deployments, &safe_transactions)?;
        Ok(Self {
            deployments,
            transactions,
            safe_transactions,
            indexes,
        })
    }

    pub fn indexes(&self) -> &LookupIndexes {
        &self.indexes
    }

    /// Recomputes every index from the source maps
    pub fn rebuild_indexes(&mut self) -> Result<(), StoreError> {
        self.indexes = LookupIndexes::build(&self.deployments, &self.safe_transactions)?;
        Ok(())
    }

    /// Applies deletions, then updates, then creations, then rebuilds indexes
    ///
    /// On error `self` may be partially modified; callers work on a copy.
    pub fn apply(&mut self, changeset: &Changeset) -> Result<(), StoreError> {
        let delete = &changeset.delete;
        for deployment in &delete.deployments {
            remove(&mut self.deployments, "deployment", &deployment.id)?;
        }
        for transaction in &delete.transactions {
            remove(&mut self.transactions, "transaction", &transaction.id)?;
        }
        for safe_tx in &delete.safe_transactions {
            remove(&mut self.safe_transactions, "safe transaction", &safe_tx.key())?;
        }

        let update = &changeset.update;
        for deployment in &update.deployments {
            replace(&mut self.deployments, "deployment", deployment.id.clone(), deployment)?;
        }
        for transaction in &update.transactions {
            replace(&mut self.transactions, "transaction", transaction.id.clone(), transaction)?;
        }
        for safe_tx in &update.safe_transactions {
            replace(&mut self.safe_transactions, "safe transaction", safe_tx.key(), safe_tx)?;
        }

        let create = &changeset.create;
        for deployment in &create.deployments {
            insert(&mut self.deployments, "deployment", deployment.id.clone(), deployment)?;
        }
        for transaction in &create.transactions {
            insert(&mut self.transactions, "transaction", transaction.id.clone(), transaction)?;
        }
        for safe_tx in &create.safe_transactions {
            insert(&mut self.safe_transactions, "safe transaction", safe_tx.key(), safe_tx)?;
        }

        self.rebuild_indexes()
    }

    pub fn deployment_by_address(&self, chain_id: u64, address: &Address) -> Option<&Deployment> {
        let id = self.indexes.deployment_at(chain_id, address)?;
        self.deployments.get(id)
    }

    /// Builds the table persisted as `registry.json`
    ///
    /// Deployments sharing a `{contract}:{label}` key resolve to the most
    /// recently created one; equal timestamps fall back to ID order.
    pub fn lookup_table(&self) -> LookupTable {
        let mut deployments: Vec<&Deployment> = self.deployments.values().collect();
        deployments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut table = LookupTable::new();
        for deployment in deployments {
            table
                .entry(deployment.chain_id)
                .or_default()
                .entry(deployment.namespace.clone())
                .or_default()
                .insert(deployment.lookup_key(), deployment.address);
        }
        table
    }
}

fn remove<T>(map: &mut BTreeMap<String, T>, kind: &'static str, id: &str) -> Result<(), StoreError> {
    map.remove(id)
        .map(|_| ())
        .ok_or_else(|| StoreError::UnknownEntry { kind, id: id.to_string() })
}

fn replace<T: Clone>(map: &mut BTreeMap<String, T>, kind: &'static str, id: String, value: &T) -> Result<(), StoreError> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::UnknownEntry { kind, id }),
    }
}

fn insert<T: Clone>(map: &mut BTreeMap<String, T>, kind: &'static str, id: String, value: &T) -> Result<(), StoreError> {
    if map.contains_key(&id) {
        return Err(StoreError::DuplicateId { kind, id });
    }
    map.insert(id, value.clone());
    Ok(())
}

impl RegistryView for Registry {
    fn has_deployment(&self, id: &str) -> bool {
        self.deployments.contains_key(id)
    }

    fn deployment_at(&self, chain_id: u64, address: &Address) -> Option<String> {
        self.indexes.deployment_at(chain_id, address).cloned()
    }

    fn transaction(&self, id: &str) -> Option<Transaction> {
        self.transactions.get(id).cloned()
    }

    fn safe_transaction(&self, key: &str) -> Option<SafeTransaction> {
        self.safe_transactions.get(key).cloned()
    }
}
