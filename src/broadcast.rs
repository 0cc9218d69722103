//! Broadcast file produced by the script tool
//!
//! After broadcasting, the tool writes a JSON record of every transaction
//! it sent together with the mined receipts. This module provides serde
//! types for that file and lookup helpers used during enrichment.

use std::path::Path;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::events::RawLog;
use crate::utils::serde_utils::{option_quantity, quantity};

/// The raw transaction request as sent by the tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTxRequest {
    pub from: Address,
    /// `None` for contract creations
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    /// Call data; some tool versions name this field `data`
    #[serde(default, alias = "data")]
    pub input: Bytes,
    #[serde(default, deserialize_with = "option_quantity")]
    pub nonce: Option<u64>,
    #[serde(default, deserialize_with = "option_quantity")]
    pub gas: Option<u64>,
}

/// A contract created as a side effect of a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalContract {
    #[serde(default)]
    pub transaction_type: String,
    pub address: Address,
    #[serde(default)]
    pub init_code: Bytes,
}

/// One externally executed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTransaction {
    /// Chain hash; absent for transactions still pending
    #[serde(default)]
    pub hash: Option<B256>,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    pub transaction: BroadcastTxRequest,
    #[serde(default)]
    pub additional_contracts: Vec<AdditionalContract>,
}

impl BroadcastTransaction {
    /// keccak256 of the call data
    pub fn input_hash(&self) -> B256 {
        keccak256(&self.transaction.input)
    }

    /// Whether the call data starts with `selector`
    pub fn has_selector(&self, selector: [u8; 4]) -> bool {
        self.transaction.input.len() >= 4 && self.transaction.input[..4] == selector
    }
}

/// A mined receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReceipt {
    pub transaction_hash: B256,
    #[serde(deserialize_with = "quantity")]
    pub block_number: u64,
    #[serde(default, deserialize_with = "option_quantity")]
    pub gas_used: Option<u64>,
    /// 1 for success, 0 for a reverted transaction
    #[serde(default, deserialize_with = "option_quantity")]
    pub status: Option<u64>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl BroadcastReceipt {
    /// A receipt without a status field is treated as successful
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |status| status != 0)
    }
}

/// Complete broadcast file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastFile {
    #[serde(default)]
    pub chain: u64,
    #[serde(default)]
    pub transactions: Vec<BroadcastTransaction>,
    #[serde(default)]
    pub receipts: Vec<BroadcastReceipt>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub commit: Option<String>,
}

impl BroadcastFile {
    /// Parses broadcast JSON
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        serde_json::from_slice(bytes).map_err(ParseError::BroadcastJson)
    }

    /// Reads and parses a broadcast file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ParseError::BroadcastRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    /// Receipt for a transaction hash
    pub fn receipt(&self, hash: &B256) -> Option<&BroadcastReceipt> {
        self.receipts.iter().find(|r| &r.transaction_hash == hash)
    }
}
