//! Mapping of a parsed execution onto registry records
//!
//! The builder is a pure function of the execution, a read-only registry
//! view and the [`BuildContext`]; it performs no I/O and reads no clock.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, B256};
use tracing::debug;

use super::Changeset;
use crate::config::BuildContext;
use crate::parser::{DeploymentRecord, SafeBatch, ScriptExecution, ScriptTransaction};
use crate::traits::RegistryView;
use crate::types::{
    deployment_id, transaction_id, ArtifactInfo, CreateMethod, Deployment, DeploymentStrategy,
    DeploymentType, ProxyInfo, ProxyUpgrade, SafeContext, SafeTransaction, Transaction,
    VerificationInfo,
};

/// Builds changesets against a registry snapshot
pub struct ChangesetBuilder<'a, R> {
    registry: &'a R,
    ctx: &'a BuildContext,
}

impl<'a, R: RegistryView> ChangesetBuilder<'a, R> {
    pub fn new(registry: &'a R, ctx: &'a BuildContext) -> Self {
        Self { registry, ctx }
    }

    /// Maps `execution` to creates and updates
    ///
    /// Deployments are always created; a deployment whose address is already
    /// recorded on the chain is skipped and linked to its existing ID.
    /// Transactions and Safe transactions already in the registry become
    /// updates with their status advanced.
    pub fn build(&self, execution: &ScriptExecution) -> Changeset {
        let mut changeset = Changeset::new();

        // Natural key → registry ID, filled as records are assigned
        let tx_ids: HashMap<B256, String> = execution
            .transactions
            .iter()
            .map(|tx| (tx.transaction_id, transaction_id(&tx.transaction_id)))
            .collect();
        let mut deployments_by_tx: HashMap<B256, Vec<String>> = HashMap::new();
        let mut assigned: HashSet<String> = HashSet::new();

        for record in &execution.deployments {
            if let Some(existing) = self.registry.deployment_at(execution.chain_id, &record.address) {
                debug!(id = %existing, address = %record.address, "deployment already recorded");
                deployments_by_tx.entry(record.transaction_id).or_default().push(existing);
                continue;
            }
            let owner = execution.transaction(&record.transaction_id);
            let id = self.assign_id(execution.chain_id, record, owner.and_then(|tx| tx.hash), &assigned);
            assigned.insert(id.clone());
            deployments_by_tx.entry(record.transaction_id).or_default().push(id.clone());

            let owner_id = tx_ids.get(&record.transaction_id).cloned().unwrap_or_default();
            changeset
                .create
                .deployments
                .push(self.deployment(id, owner_id, execution, record));
        }

        for tx in &execution.transactions {
            let deployments = deployments_by_tx.remove(&tx.transaction_id).unwrap_or_default();
            let safe_context = tx
                .safe_tx_hash
                .and_then(|hash| execution.safe_batches.iter().find(|b| b.safe_tx_hash == hash))
                .zip(tx.safe_batch_index)
                .map(|(batch, batch_index)| SafeContext {
                    safe_address: batch.safe,
                    safe_tx_hash: batch.safe_tx_hash,
                    batch_index,
                    proposer: batch.proposer,
                });
            let record = self.transaction(&tx_ids[&tx.transaction_id], execution.chain_id, tx, deployments, safe_context);

            match self.registry.transaction(&record.id) {
                Some(existing) => {
                    let merged = merge_transaction(existing.clone(), record);
                    if merged != existing {
                        changeset.update.transactions.push(merged);
                    }
                }
                None => changeset.create.transactions.push(record),
            }
        }

        for batch in &execution.safe_batches {
            let record = self.safe_transaction(execution.chain_id, batch, &tx_ids);
            match self.registry.safe_transaction(&record.key()) {
                Some(existing) => {
                    let merged = merge_safe_transaction(existing.clone(), record);
                    if merged != existing {
                        changeset.update.safe_transactions.push(merged);
                    }
                }
                None => changeset.create.safe_transactions.push(record),
            }
        }

        changeset
    }

    /// Picks a deployment ID unique in the registry and in this changeset
    ///
    /// Collisions append the first four hex characters of the owning
    /// transaction hash, then the build timestamp.
    fn assign_id(
        &self,
        chain_id: u64,
        record: &DeploymentRecord,
        owner_hash: Option<B256>,
        assigned: &HashSet<String>,
    ) -> String {
        let taken = |id: &str| self.registry.has_deployment(id) || assigned.contains(id);

        let base = deployment_id(&self.ctx.namespace, chain_id, &record.contract_name, &record.label);
        if !taken(&base) {
            return base;
        }

        if let Some(hash) = owner_hash {
            let hex = format!("{:x}", hash);
            let candidate = format!("{}-{}", base, &hex[..4]);
            if !taken(&candidate) {
                return candidate;
            }
        }

        let timestamp = self.ctx.now.timestamp();
        let mut candidate = format!("{}-{}", base, timestamp);
        let mut n = 1;
        while taken(&candidate) {
            candidate = format!("{}-{}-{}", base, timestamp, n);
            n += 1;
        }
        debug!(base = %base, id = %candidate, "deployment ID collision resolved with timestamp");
        candidate
    }

    fn deployment(
        &self,
        id: String,
        transaction_id: String,
        execution: &ScriptExecution,
        record: &DeploymentRecord,
    ) -> Deployment {
        let relationship = execution.proxy(&record.address);
        let deployment_type = if relationship.is_some() {
            DeploymentType::Proxy
        } else if record.is_library {
            DeploymentType::Library
        } else {
            DeploymentType::Singleton
        };

        let proxy_info = relationship.map(|rel| ProxyInfo {
            proxy_type: rel.proxy_type,
            implementation: rel.implementation,
            admin: rel.admin,
            beacon: rel.beacon,
            history: (rel.implementation != Address::ZERO)
                .then(|| ProxyUpgrade {
                    implementation: rel.implementation,
                    upgraded_at: self.ctx.now,
                })
                .into_iter()
                .collect(),
        });

        let deterministic = record.create_method != CreateMethod::Create;
        Deployment {
            id,
            namespace: self.ctx.namespace.clone(),
            chain_id: execution.chain_id,
            contract_name: record.contract_name.clone(),
            label: record.label.clone(),
            address: record.address,
            deployment_type,
            transaction_id,
            deployment_strategy: DeploymentStrategy {
                method: record.create_method,
                salt: deterministic.then_some(record.salt),
                init_code_hash: non_zero(record.init_code_hash),
                constructor_args: record.constructor_args.clone(),
                factory: record.create_method.factory(),
                entropy: record.entropy.clone(),
            },
            proxy_info,
            artifact: ArtifactInfo {
                path: record.source_path.clone(),
                compiler_version: record.compiler_version.clone(),
                bytecode_hash: record.bytecode_hash,
                script_path: self.ctx.script_path.clone(),
                git_commit: self.ctx.git_commit.clone(),
            },
            verification: VerificationInfo::default(),
            tags: Vec::new(),
            created_at: self.ctx.now,
            updated_at: self.ctx.now,
        }
    }

    fn transaction(
        &self,
        id: &str,
        chain_id: u64,
        tx: &ScriptTransaction,
        deployments: Vec<String>,
        safe_context: Option<SafeContext>,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            chain_id,
            hash: tx.hash,
            status: tx.status,
            block_number: tx.block_number,
            gas_used: tx.gas_used,
            sender: tx.sender,
            to: Some(tx.to),
            value: tx.value,
            data: tx.data.clone(),
            deployments,
            safe_context,
            environment: self.ctx.namespace.clone(),
            created_at: self.ctx.now,
        }
    }

    fn safe_transaction(&self, chain_id: u64, batch: &SafeBatch, tx_ids: &HashMap<B256, String>) -> SafeTransaction {
        SafeTransaction {
            safe_tx_hash: batch.safe_tx_hash,
            safe_address: batch.safe,
            chain_id,
            proposer: batch.proposer,
            transaction_ids: batch
                .transaction_ids
                .iter()
                .map(|id| tx_ids.get(id).cloned().unwrap_or_else(|| transaction_id(id)))
                .collect(),
            executed: batch.executed,
            execution_tx_hash: batch.execution_hash,
            execution_block_number: batch.execution_block,
            proposed_at: self.ctx.now,
            executed_at: batch.executed.then_some(self.ctx.now),
        }
    }
}

fn non_zero(hash: B256) -> Option<B256> {
    (hash != B256::ZERO).then_some(hash)
}

/// Folds a freshly built record into the stored one
///
/// Status only advances; known on-chain fields are never cleared.
fn merge_transaction(mut existing: Transaction, new: Transaction) -> Transaction {
    existing.status = existing.status.advance(new.status);
    existing.hash = existing.hash.or(new.hash);
    existing.block_number = existing.block_number.or(new.block_number);
    existing.gas_used = existing.gas_used.or(new.gas_used);
    existing.safe_context = existing.safe_context.or(new.safe_context);
    for id in new.deployments {
        if !existing.deployments.contains(&id) {
            existing.deployments.push(id);
        }
    }
    existing
}

fn merge_safe_transaction(mut existing: SafeTransaction, new: SafeTransaction) -> SafeTransaction {
    if new.executed && !existing.executed {
        existing.executed = true;
        existing.executed_at = new.executed_at;
    }
    existing.execution_tx_hash = existing.execution_tx_hash.or(new.execution_tx_hash);
    existing.execution_block_number = existing.execution_block_number.or(new.execution_block_number);
    for id in new.transaction_ids {
        if !existing.transaction_ids.contains(&id) {
            existing.transaction_ids.push(id);
        }
    }
    existing
}
