//! Collaborator traits at the boundaries of the core
//!
//! This module provides traits for:
//! - Querying live chain state during pruning
//! - Resolving contract metadata from compiled artifacts
//! - Reading a registry snapshot while building a changeset
//!
//! # Key Traits
//! - `BlockchainChecker`: code and transaction existence oracle
//! - `ContractIndex`: bytecode-hash / artifact-path → contract metadata
//! - `RegistryView`: read-only access used by the changeset builder

use alloy::primitives::{Address, B256};
use crate::errors::CheckerError;
use crate::types::{SafeTransaction, Transaction};

/// Existence oracle for on-chain state
///
/// Queries are issued one at a time by the pruner. Timeouts and cancellation
/// are the implementor's responsibility; any error makes the pruner keep the
/// item under inspection.
#[allow(async_fn_in_trait)]
pub trait BlockchainChecker {
    /// Returns whether non-empty code exists at `address`
    async fn has_code(&self, address: Address) -> Result<bool, CheckerError>;

    /// Returns the block number the transaction was mined in
    ///
    /// # Returns
    /// * `Ok(Some(block))` - Transaction found on-chain
    /// * `Ok(None)` - Transaction hash does not resolve
    /// * `Err(_)` - The query itself failed
    async fn transaction_block(&self, hash: B256) -> Result<Option<u64>, CheckerError>;
}

/// Contract metadata resolved from compiled artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInfo {
    /// Contract name, e.g. `Counter`
    pub name: String,
    /// Source path, e.g. `src/Counter.sol`
    pub source_path: String,
    /// Compiler version the artifact was built with
    pub compiler_version: String,
    /// Whether the artifact is a library
    pub is_library: bool,
}

/// Lookup of contract metadata
///
/// Both lookups may miss; the parser then keeps a deployment with whatever
/// it can infer from the event alone.
pub trait ContractIndex {
    /// Looks up a contract by the keccak256 of its creation bytecode
    fn by_bytecode_hash(&self, hash: B256) -> Option<ContractInfo>;

    /// Looks up a contract by artifact identifier, e.g. `src/Counter.sol:Counter`
    fn by_artifact(&self, artifact: &str) -> Option<ContractInfo>;
}

impl<T: ContractIndex + ?Sized> ContractIndex for &T {
    fn by_bytecode_hash(&self, hash: B256) -> Option<ContractInfo> {
        (**self).by_bytecode_hash(hash)
    }

    fn by_artifact(&self, artifact: &str) -> Option<ContractInfo> {
        (**self).by_artifact(artifact)
    }
}

/// Read-only registry access for the changeset builder
///
/// Implementations return owned copies, never references into shared state.
pub trait RegistryView {
    /// Whether a deployment with this ID exists
    fn has_deployment(&self, id: &str) -> bool;

    /// ID of the deployment already recorded at `address` on `chain_id`
    fn deployment_at(&self, chain_id: u64, address: &Address) -> Option<String>;

    /// Existing transaction with this registry ID
    fn transaction(&self, id: &str) -> Option<Transaction>;

    /// Existing Safe transaction with this hash key
    fn safe_transaction(&self, key: &str) -> Option<SafeTransaction>;
}
