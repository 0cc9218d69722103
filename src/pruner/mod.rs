//! Reconciling the registry against live chain state
//!
//! The pruner scans one chain's entries, asks a [`BlockchainChecker`] whether
//! each one still exists on-chain, and produces a delete-only changeset with
//! a reason per entry.
//!
//! # Rules
//! - Deployments without code are stale; so are proxies whose recorded
//!   implementation has no code
//! - Executed transactions without a hash, with a hash that does not
//!   resolve, or mined in a different block than recorded are stale
//! - Safe transactions whose Safe has no code, or whose execution hash does
//!   not resolve, are stale
//! - Pending entries are skipped unless `include_pending` is set
//!
//! Any oracle error keeps the entry. Deleting live data cannot be undone,
//! keeping stale data can.
//!
//! The changeset only deletes. Links held by surviving entries
//! (`Transaction.deployments`, `Deployment.transaction_id`,
//! `SafeTransaction.transaction_ids`) may keep naming a pruned ID; lookups
//! through such a link return `None`.

pub mod rpc;

pub use rpc::{connect_http, RpcChecker};

use alloy::primitives::{Address, B256};
use tracing::{debug, info, warn};

use crate::changeset::Changeset;
use crate::errors::{CheckerError, PruneError};
use crate::registry::{Registry, RegistryStore};
use crate::traits::BlockchainChecker;
use crate::types::{Deployment, DeploymentType, SafeTransaction, Transaction, TransactionStatus};

/// Outcome of checking one entry
enum Verdict {
    Keep,
    Prune(String),
}

/// Registry pruner for a store and an oracle
pub struct Pruner<'a, C> {
    store: &'a RegistryStore,
    checker: C,
}

impl<'a, C: BlockchainChecker> Pruner<'a, C> {
    pub fn new(store: &'a RegistryStore, checker: C) -> Self {
        Self { store, checker }
    }

    /// Scans `chain_id` and collects stale entries
    ///
    /// Read-only: the registry is not modified. Oracle queries are issued
    /// one at a time.
    ///
    /// # Returns
    /// A changeset whose only non-empty bucket is `delete`, with a reason
    /// recorded for every entry
    pub async fn collect_prunable_items(&self, chain_id: u64, include_pending: bool) -> Changeset {
        let registry = self.store.snapshot();
        let mut changeset = Changeset::new();

        for deployment in registry.deployments.values().filter(|d| d.chain_id == chain_id) {
            if !include_pending && owner_is_pending(&registry, deployment) {
                debug!(id = %deployment.id, "skipping deployment with pending transaction");
                continue;
            }
            if let Verdict::Prune(reason) = self.check_deployment(deployment).await {
                changeset.delete_deployment(deployment.clone(), reason);
            }
        }

        for transaction in registry.transactions.values().filter(|tx| tx.chain_id == chain_id) {
            if !include_pending && transaction.status.is_pending() {
                continue;
            }
            if let Verdict::Prune(reason) = self.check_transaction(transaction).await {
                changeset.delete_transaction(transaction.clone(), reason);
            }
        }

        for safe_tx in registry.safe_transactions.values().filter(|s| s.chain_id == chain_id) {
            if !include_pending && !safe_tx.executed {
                continue;
            }
            if let Verdict::Prune(reason) = self.check_safe_transaction(safe_tx).await {
                changeset.delete_safe_transaction(safe_tx.clone(), reason);
            }
        }

        info!(
            chain_id,
            include_pending,
            deployments = changeset.delete.deployments.len(),
            transactions = changeset.delete.transactions.len(),
            safe_transactions = changeset.delete.safe_transactions.len(),
            "collected prunable items"
        );
        changeset
    }

    /// Applies a changeset produced by [`Pruner::collect_prunable_items`]
    pub fn execute_prune(&self, changeset: &Changeset) -> Result<(), PruneError> {
        if changeset.is_empty() {
            debug!("nothing to prune");
            return Ok(());
        }
        self.store.apply(changeset)?;
        info!(deleted = changeset.delete.len(), "registry pruned");
        Ok(())
    }

    async fn check_deployment(&self, deployment: &Deployment) -> Verdict {
        match self.code_exists(deployment.address, &deployment.id).await {
            Some(false) => return Verdict::Prune(format!("no code at {:#x}", deployment.address)),
            Some(true) => {}
            None => return Verdict::Keep,
        }

        let implementation = deployment
            .proxy_info
            .as_ref()
            .filter(|_| deployment.deployment_type == DeploymentType::Proxy)
            .map(|info| info.implementation)
            .filter(|implementation| *implementation != Address::ZERO);
        if let Some(implementation) = implementation {
            if self.code_exists(implementation, &deployment.id).await == Some(false) {
                return Verdict::Prune(format!("no code at proxy implementation {:#x}", implementation));
            }
        }
        Verdict::Keep
    }

    async fn check_transaction(&self, transaction: &Transaction) -> Verdict {
        let Some(hash) = transaction.hash else {
            return match transaction.status {
                TransactionStatus::Executed => Verdict::Prune("executed transaction has no hash".into()),
                TransactionStatus::Simulated | TransactionStatus::Queued => {
                    Verdict::Prune("transaction was never broadcast".into())
                }
                TransactionStatus::Failed => Verdict::Keep,
            };
        };

        match self.mined_block(hash, &transaction.id).await {
            Some(None) => Verdict::Prune(format!("transaction {:#x} not found on-chain", hash)),
            Some(Some(block)) => match transaction.block_number {
                Some(recorded) if recorded != block => Verdict::Prune(format!(
                    "transaction mined in block {} but recorded in block {}",
                    block, recorded
                )),
                _ => Verdict::Keep,
            },
            None => Verdict::Keep,
        }
    }

    async fn check_safe_transaction(&self, safe_tx: &SafeTransaction) -> Verdict {
        let key = safe_tx.key();
        match self.code_exists(safe_tx.safe_address, &key).await {
            Some(false) => return Verdict::Prune(format!("no code at Safe {:#x}", safe_tx.safe_address)),
            Some(true) => {}
            None => return Verdict::Keep,
        }

        if !safe_tx.executed {
            return Verdict::Keep;
        }
        let Some(hash) = safe_tx.execution_tx_hash else {
            return Verdict::Keep;
        };
        match self.mined_block(hash, &key).await {
            Some(None) => Verdict::Prune(format!("execution transaction {:#x} not found on-chain", hash)),
            _ => Verdict::Keep,
        }
    }

    /// `None` when the oracle failed
    async fn code_exists(&self, address: Address, entry: &str) -> Option<bool> {
        log_error(self.checker.has_code(address).await, entry)
    }

    /// `None` when the oracle failed
    async fn mined_block(&self, hash: B256, entry: &str) -> Option<Option<u64>> {
        log_error(self.checker.transaction_block(hash).await, entry)
    }
}

fn log_error<T>(result: Result<T, CheckerError>, entry: &str) -> Option<T> {
    result
        .map_err(|err| warn!(entry, %err, "chain check failed, keeping entry"))
        .ok()
}

fn owner_is_pending(registry: &Registry, deployment: &Deployment) -> bool {
    registry
        .transactions
        .get(&deployment.transaction_id)
        .is_some_and(|tx| tx.status.is_pending())
}
