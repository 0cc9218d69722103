//! Execution parser
//!
//! Reconstructs a [`ScriptExecution`] from the outputs of one script run:
//! the emitted logs, the call-trace arenas and, when the run was broadcast,
//! the broadcast file with its receipts.
//!
//! # Pipeline
//! 1. Decode logs; `TransactionSimulated` events become SIMULATED transactions
//!    in emission order
//! 2. `ContractDeployed` events become deployment records, resolved against a
//!    [`ContractIndex`]
//! 3. Proxy-family events are folded by [`ProxyTracker`]
//! 4. Safe batch events create or update batches and promote their transactions
//! 5. Pending transactions are matched against the trace arenas
//! 6. Broadcast entries enrich transactions with hash, block and gas
//! 7. Safe `execTransaction` broadcasts enrich executed batches
//!
//! Only unreadable broadcast data aborts a parse; every other anomaly leaves
//! a partially populated record behind.

pub mod enrich;
pub mod matching;
pub mod proxy;
pub mod types;

pub use matching::{effective_sender, match_traces, CHEATCODE_ADDRESS};
pub use proxy::ProxyTracker;
pub use types::{DeploymentRecord, ProxyRelationship, SafeBatch, ScriptExecution, ScriptTransaction};

use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::B256;
use tracing::{debug, info};

use crate::broadcast::BroadcastFile;
use crate::errors::ParseError;
use crate::events::{ContractDeployedEvent, DomainEvent, EventDecoder, SafeBatchEvent, TransactionSimulatedEvent};
use crate::trace::ScriptOutput;
use crate::traits::ContractIndex;
use crate::types::{CreateMethod, TransactionStatus};

/// Parser for script runs
///
/// Holds the event signature table and the contract index used to resolve
/// deployment metadata. Parsing never touches the registry.
#[derive(Debug, Clone)]
pub struct ExecutionParser<I> {
    decoder: EventDecoder,
    contracts: I,
}

impl<I: ContractIndex> ExecutionParser<I> {
    pub fn new(contracts: I) -> Self {
        Self {
            decoder: EventDecoder::default(),
            contracts,
        }
    }

    /// Replaces the default event signature table
    pub fn with_decoder(mut self, decoder: EventDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Parses one run
    ///
    /// # Arguments
    /// * `output` - Script tool result with logs and trace arenas
    /// * `broadcast` - Raw broadcast file contents, if the run was broadcast
    /// * `network` - Network name, recorded as-is
    /// * `chain_id` - Chain the run targeted
    ///
    /// # Returns
    /// * `Ok(ScriptExecution)` - Fully populated execution
    /// * `Err(ParseError)` - The broadcast data is not valid JSON
    pub fn parse(
        &self,
        output: &ScriptOutput,
        broadcast: Option<&[u8]>,
        network: &str,
        chain_id: u64,
    ) -> Result<ScriptExecution, ParseError> {
        // Fail before doing any work if the broadcast is unusable
        let broadcast = broadcast.map(BroadcastFile::from_slice).transpose()?;

        let mut builder = ExecutionBuilder::default();
        let mut proxies = ProxyTracker::new();

        for event in self.decoder.decode_all(&output.raw_logs) {
            match event {
                DomainEvent::TransactionSimulated(ev) => builder.add_transaction(ev),
                DomainEvent::ContractDeployed(ev) => {
                    let record = self.deployment_record(ev);
                    builder.deployments.push(record);
                }
                DomainEvent::SafeTransactionQueued(ev) => builder.add_safe_batch(ev, false),
                DomainEvent::SafeTransactionExecuted(ev) => builder.add_safe_batch(ev, true),
                other => {
                    proxies.apply(&other);
                }
            }
        }
        builder.link_safe_batches();

        let mut execution = ScriptExecution {
            network: network.to_string(),
            chain_id,
            success: output.success,
            transactions: builder.transactions,
            deployments: builder.deployments,
            proxies: proxies.into_relationships(),
            safe_batches: builder.safe_batches,
            logs: output.raw_logs.clone(),
        };

        let traced = match_traces(&mut execution.transactions, output.arenas());

        if let Some(broadcast) = &broadcast {
            let consumed = enrich::enrich_transactions(&mut execution.transactions, broadcast);
            enrich::enrich_safe_batches(
                &mut execution.safe_batches,
                &mut execution.transactions,
                broadcast,
                &consumed,
            );
        }

        info!(
            network,
            chain_id,
            transactions = execution.transactions.len(),
            deployments = execution.deployments.len(),
            proxies = execution.proxies.len(),
            safe_batches = execution.safe_batches.len(),
            traced,
            "parsed script execution"
        );
        Ok(execution)
    }

    /// Parses one run, reading the broadcast file from disk
    ///
    /// A `broadcast_path` that does not exist is treated as a run that was
    /// never broadcast; a file that exists but cannot be read is an error.
    pub fn parse_output(
        &self,
        output: &ScriptOutput,
        broadcast_path: Option<&Path>,
        network: &str,
        chain_id: u64,
    ) -> Result<ScriptExecution, ParseError> {
        let bytes = match broadcast_path {
            Some(path) if path.exists() => {
                Some(std::fs::read(path).map_err(|source| ParseError::BroadcastRead {
                    path: path.to_path_buf(),
                    source,
                })?)
            }
            Some(path) => {
                debug!(path = %path.display(), "no broadcast file, run was not broadcast");
                None
            }
            None => None,
        };
        self.parse(output, bytes.as_deref(), network, chain_id)
    }

    fn deployment_record(&self, ev: ContractDeployedEvent) -> DeploymentRecord {
        let (source_path, contract_name) = split_artifact(&ev.artifact);
        let mut record = DeploymentRecord {
            transaction_id: ev.transaction_id,
            address: ev.location,
            deployer: ev.deployer,
            contract_name,
            source_path,
            compiler_version: String::new(),
            is_library: false,
            resolved: false,
            label: ev.label,
            entropy: ev.entropy,
            salt: ev.salt,
            bytecode_hash: ev.bytecode_hash,
            init_code_hash: ev.init_code_hash,
            constructor_args: ev.constructor_args,
            create_method: CreateMethod::from_event_str(&ev.create_strategy),
            artifact: ev.artifact,
        };

        let info = (ev.bytecode_hash != B256::ZERO)
            .then(|| self.contracts.by_bytecode_hash(ev.bytecode_hash))
            .flatten()
            .or_else(|| self.contracts.by_artifact(&record.artifact));
        match info {
            Some(info) => record.apply_contract_info(info),
            None => debug!(
                artifact = %record.artifact,
                address = %record.address,
                "contract metadata not found in index"
            ),
        }
        record
    }
}

/// Splits `src/Counter.sol:Counter` into source path and contract name
///
/// Without a `:` the file stem is used as the name.
fn split_artifact(artifact: &str) -> (String, String) {
    match artifact.rsplit_once(':') {
        Some((path, name)) => (path.to_string(), name.to_string()),
        None => {
            let name = Path::new(artifact)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(artifact);
            (artifact.to_string(), name.to_string())
        }
    }
}

/// Accumulates transactions and batches while events are folded
///
/// Transactions live in a vector in emission order; the map only points
/// into it, so iteration order never depends on hashing.
#[derive(Default)]
struct ExecutionBuilder {
    transactions: Vec<ScriptTransaction>,
    tx_index: HashMap<B256, usize>,
    deployments: Vec<DeploymentRecord>,
    safe_batches: Vec<SafeBatch>,
    batch_index: HashMap<B256, usize>,
}

impl ExecutionBuilder {
    fn add_transaction(&mut self, ev: TransactionSimulatedEvent) {
        if self.tx_index.contains_key(&ev.transaction_id) {
            debug!(transaction_id = %ev.transaction_id, "duplicate simulated transaction ignored");
            return;
        }
        self.tx_index.insert(ev.transaction_id, self.transactions.len());
        self.transactions.push(ScriptTransaction {
            transaction_id: ev.transaction_id,
            sender_id: ev.sender_id,
            sender: ev.sender,
            to: ev.to,
            value: ev.value,
            data: ev.data,
            label: ev.label,
            return_data: ev.return_data,
            status: TransactionStatus::Simulated,
            hash: None,
            block_number: None,
            gas_used: None,
            safe_tx_hash: None,
            safe_batch_index: None,
            trace: None,
        });
    }

    fn add_safe_batch(&mut self, ev: SafeBatchEvent, executed: bool) {
        match self.batch_index.get(&ev.safe_tx_hash) {
            Some(&i) => {
                let batch = &mut self.safe_batches[i];
                batch.executed |= executed;
                for id in ev.transaction_ids {
                    if !batch.transaction_ids.contains(&id) {
                        batch.transaction_ids.push(id);
                    }
                }
            }
            None => {
                self.batch_index.insert(ev.safe_tx_hash, self.safe_batches.len());
                self.safe_batches.push(SafeBatch {
                    safe_tx_hash: ev.safe_tx_hash,
                    safe: ev.safe,
                    proposer: ev.actor,
                    transaction_ids: ev.transaction_ids,
                    executed,
                    execution_hash: None,
                    execution_block: None,
                });
            }
        }
    }

    /// Promotes batched transactions once every event has been seen
    fn link_safe_batches(&mut self) {
        for batch in &self.safe_batches {
            let status = if batch.executed {
                TransactionStatus::Executed
            } else {
                TransactionStatus::Queued
            };
            for (position, id) in batch.transaction_ids.iter().enumerate() {
                let Some(&i) = self.tx_index.get(id) else {
                    debug!(transaction_id = %id, safe_tx_hash = %batch.safe_tx_hash, "batched transaction was not simulated");
                    continue;
                };
                let tx = &mut self.transactions[i];
                tx.advance(status);
                tx.safe_tx_hash = Some(batch.safe_tx_hash);
                tx.safe_batch_index = Some(position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_artifact() {
        assert_eq!(
            split_artifact("src/Counter.sol:Counter"),
            ("src/Counter.sol".to_string(), "Counter".to_string())
        );
        assert_eq!(
            split_artifact("src/Token.sol"),
            ("src/Token.sol".to_string(), "Token".to_string())
        );
        assert_eq!(split_artifact(""), (String::new(), String::new()));
    }
}
