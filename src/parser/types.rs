//! In-memory model of one script run
//!
//! A `ScriptExecution` is produced by the parser in a single pass, consumed
//! once by the changeset builder and never persisted as-is.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::Serialize;

use crate::events::RawLog;
use crate::trace::TraceFragment;
use crate::traits::ContractInfo;
use crate::types::{CreateMethod, ProxyType, TransactionStatus};

/// A transaction recorded during simulation, enriched as the run is parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptTransaction {
    /// Opaque ID assigned by the script tool at simulation time
    pub transaction_id: B256,
    /// Logical sender name from the script configuration
    pub sender_id: String,
    pub sender: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub label: String,
    pub return_data: Bytes,
    pub status: TransactionStatus,
    /// Chain hash once matched against the broadcast file
    pub hash: Option<B256>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// Safe batch carrying this transaction, if any
    pub safe_tx_hash: Option<B256>,
    pub safe_batch_index: Option<usize>,
    /// Call subtree matched from the trace arenas
    pub trace: Option<TraceFragment>,
}

impl ScriptTransaction {
    /// Promotes the status, never moving it backwards
    pub fn advance(&mut self, next: TransactionStatus) {
        self.status = self.status.advance(next);
    }
}

/// A contract deployment observed in the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    /// Internal ID of the owning transaction
    pub transaction_id: B256,
    pub address: Address,
    pub deployer: Address,
    /// Artifact identifier as emitted, e.g. `src/Counter.sol:Counter`
    pub artifact: String,
    pub contract_name: String,
    pub source_path: String,
    pub compiler_version: String,
    pub is_library: bool,
    /// Whether metadata came from the contract index rather than the event alone
    pub resolved: bool,
    pub label: String,
    pub entropy: String,
    pub salt: B256,
    pub bytecode_hash: B256,
    pub init_code_hash: B256,
    pub constructor_args: Bytes,
    pub create_method: CreateMethod,
}

impl DeploymentRecord {
    pub(crate) fn apply_contract_info(&mut self, info: ContractInfo) {
        self.contract_name = info.name;
        if !info.source_path.is_empty() {
            self.source_path = info.source_path;
        }
        self.compiler_version = info.compiler_version;
        self.is_library = info.is_library;
        self.resolved = true;
    }
}

/// Heuristic proxy → implementation relationship
///
/// `implementation` is the zero address when only a beacon is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyRelationship {
    pub proxy: Address,
    pub implementation: Address,
    pub proxy_type: ProxyType,
    pub admin: Option<Address>,
    pub beacon: Option<Address>,
}

/// A Safe batch observed in the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeBatch {
    pub safe_tx_hash: B256,
    pub safe: Address,
    pub proposer: Address,
    /// Internal IDs of the batched transactions, in batch order
    pub transaction_ids: Vec<B256>,
    pub executed: bool,
    pub execution_hash: Option<B256>,
    pub execution_block: Option<u64>,
}

/// Everything that happened in one script run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptExecution {
    pub network: String,
    pub chain_id: u64,
    pub success: bool,
    /// Transactions in simulation order
    pub transactions: Vec<ScriptTransaction>,
    pub deployments: Vec<DeploymentRecord>,
    pub proxies: HashMap<Address, ProxyRelationship>,
    /// Safe batches in discovery order
    pub safe_batches: Vec<SafeBatch>,
    pub logs: Vec<RawLog>,
}

impl ScriptExecution {
    pub fn transaction(&self, transaction_id: &B256) -> Option<&ScriptTransaction> {
        self.transactions
            .iter()
            .find(|tx| &tx.transaction_id == transaction_id)
    }

    /// Deployments created by the given transaction
    pub fn deployments_of<'a>(
        &'a self,
        transaction_id: &'a B256,
    ) -> impl Iterator<Item = &'a DeploymentRecord> + 'a {
        self.deployments
            .iter()
            .filter(move |d| &d.transaction_id == transaction_id)
    }

    pub fn proxy(&self, address: &Address) -> Option<&ProxyRelationship> {
        self.proxies.get(address)
    }
}
