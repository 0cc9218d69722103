//! Core persisted types for the deployment registry
//!
//! This module defines the records stored in the registry documents:
//! - Deployments with their strategy, proxy, artifact and verification data
//! - Transactions and their forward-only status lifecycle
//! - Safe (multisig) transaction batches
//!
//! All types serialize to camelCase JSON with SCREAMING_CASE enum values.

pub use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::primitives::address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CreateX factory used for CREATE2 and CREATE3 deployments
pub const CREATEX_FACTORY_ADDRESS: Address = address!("ba5Ed099633D3B313e4D5F7bdc1305d3c28ba5Ed");

/// Builds the stable identity `{namespace}/{chainID}/{contractName}:{label}`
///
/// The `:{label}` segment is omitted when the label is empty.
pub fn deployment_id(namespace: &str, chain_id: u64, contract_name: &str, label: &str) -> String {
    format!("{}/{}/{}", namespace, chain_id, lookup_key(contract_name, label))
}

/// Builds the `{contractName}:{label}` key used inside a namespace
pub fn lookup_key(contract_name: &str, label: &str) -> String {
    if label.is_empty() {
        contract_name.to_string()
    } else {
        format!("{}:{}", contract_name, label)
    }
}

/// Registry ID of a transaction, derived from the tool's internal ID
///
/// The same simulated call keeps the same ID across runs, which lets a
/// later run update the record instead of duplicating it.
pub fn transaction_id(internal_id: &B256) -> String {
    format!("tx-{:#x}", internal_id)
}

/// How a deployed contract is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentType {
    /// Plain contract instance
    Singleton,
    /// Proxy pointing at an implementation
    Proxy,
    /// Linked library
    Library,
}

/// Address derivation scheme used for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CreateMethod {
    Create,
    Create2,
    Create3,
}

impl CreateMethod {
    /// Parses the strategy string carried by deployment events
    ///
    /// Unknown strings fall back to `Create`.
    pub fn from_event_str(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE2" => CreateMethod::Create2,
            "CREATE3" => CreateMethod::Create3,
            _ => CreateMethod::Create,
        }
    }

    /// Factory that performs deployments of this kind, if any
    pub fn factory(&self) -> Option<Address> {
        match self {
            CreateMethod::Create => None,
            CreateMethod::Create2 | CreateMethod::Create3 => Some(CREATEX_FACTORY_ADDRESS),
        }
    }
}

/// Deterministic deployment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategy {
    /// CREATE, CREATE2 or CREATE3
    pub method: CreateMethod,
    /// Salt for CREATE2/CREATE3 deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
    /// keccak256 of the init code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_code_hash: Option<B256>,
    /// ABI-encoded constructor arguments
    #[serde(default)]
    pub constructor_args: Bytes,
    /// Factory contract performing the deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Human-readable entropy the salt was derived from
    #[serde(default)]
    pub entropy: String,
}

/// Heuristic proxy classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyType {
    /// Minimal/clone proxy with a fixed implementation
    Minimal,
    /// EIP-1822 universal upgradeable proxy
    Uups,
    /// EIP-1967 transparent proxy with a separate admin
    Transparent,
    /// Beacon proxy resolving its implementation through a beacon
    Beacon,
}

/// One entry of a proxy's implementation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyUpgrade {
    pub implementation: Address,
    pub upgraded_at: DateTime<Utc>,
}

/// Proxy metadata attached to PROXY deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyInfo {
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
    pub implementation: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon: Option<Address>,
    #[serde(default)]
    pub history: Vec<ProxyUpgrade>,
}

/// Compilation metadata for the deployed artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    /// Source path, e.g. `src/Counter.sol`
    pub path: String,
    #[serde(default)]
    pub compiler_version: String,
    #[serde(default)]
    pub bytecode_hash: B256,
    /// Script that performed the deployment
    #[serde(default)]
    pub script_path: String,
    #[serde(default)]
    pub git_commit: String,
}

/// Block explorer verification state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Partial,
    Failed,
}

/// Verification record, updated after explorer submissions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInfo {
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

/// A persisted deployment
///
/// Identity is `{namespace}/{chainID}/{contractName}:{label}`; the address is
/// unique per chain across the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub namespace: String,
    pub chain_id: u64,
    pub contract_name: String,
    #[serde(default)]
    pub label: String,
    pub address: Address,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,
    /// Registry ID of the owning transaction
    #[serde(default)]
    pub transaction_id: String,
    pub deployment_strategy: DeploymentStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_info: Option<ProxyInfo>,
    pub artifact: ArtifactInfo,
    #[serde(default)]
    pub verification: VerificationInfo,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// The `{contractName}:{label}` key within its namespace
    pub fn lookup_key(&self) -> String {
        lookup_key(&self.contract_name, &self.label)
    }

    /// Lowercased `0x`-prefixed address used by the address index
    pub fn address_key(&self) -> String {
        format!("{:#x}", self.address)
    }
}

/// Lifecycle of a transaction
///
/// Status only moves forward: SIMULATED → QUEUED → EXECUTED | FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Simulated,
    Queued,
    Executed,
    Failed,
}

impl TransactionStatus {
    fn rank(&self) -> u8 {
        match self {
            TransactionStatus::Simulated => 0,
            TransactionStatus::Queued => 1,
            TransactionStatus::Executed | TransactionStatus::Failed => 2,
        }
    }

    /// Returns the status after attempting to move to `next`
    ///
    /// Regressions are ignored, and a terminal status is never replaced.
    pub fn advance(self, next: TransactionStatus) -> TransactionStatus {
        if next.rank() > self.rank() {
            next
        } else {
            self
        }
    }

    /// Whether the transaction has not reached the chain yet
    pub fn is_pending(&self) -> bool {
        matches!(self, TransactionStatus::Simulated | TransactionStatus::Queued)
    }
}

/// Link from a transaction to the Safe batch that carried it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeContext {
    pub safe_address: Address,
    pub safe_tx_hash: B256,
    pub batch_index: usize,
    pub proposer: Address,
}

/// A persisted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<B256>,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    pub sender: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    /// Registry IDs of deployments created by this transaction
    #[serde(default)]
    pub deployments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_context: Option<SafeContext>,
    /// Namespace the transaction ran in
    #[serde(default)]
    pub environment: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted Safe multisig batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransaction {
    pub safe_tx_hash: B256,
    pub safe_address: Address,
    pub chain_id: u64,
    pub proposer: Address,
    /// Registry IDs of the batched transactions, in batch order
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_block_number: Option<u64>,
    pub proposed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl SafeTransaction {
    /// Registry key: the `0x`-prefixed Safe transaction hash
    pub fn key(&self) -> String {
        format!("{:#x}", self.safe_tx_hash)
    }
}
