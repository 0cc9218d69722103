//! Error types for script parsing, registry persistence and pruning
//!
//! This module defines the error handling used across the crate:
//! - Parse errors (fatal only for unreadable broadcast data)
//! - Registry store errors (I/O, corruption, changeset conflicts)
//! - Blockchain oracle errors (always treated as "keep" by the pruner)
//! - Error conversion and propagation into a single top-level type

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the deployment registry
///
/// Encompasses all errors that library operations can return,
/// providing a unified error handling interface for callers.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Errors occurring while parsing a script run
    #[error("Failed to parse script execution: {0}")]
    Parse(#[from] ParseError),

    /// Errors occurring while reading or writing the registry
    #[error("Registry store error: {0}")]
    Store(#[from] StoreError),

    /// Errors occurring while pruning the registry
    #[error("Prune error: {0}")]
    Prune(#[from] PruneError),
}

/// Script output and broadcast file errors
///
/// Only these abort a parse. Undecodable events, unmatched traces and
/// unresolved artifacts degrade to partial records instead.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The broadcast file exists but could not be read
    #[error("Failed to read broadcast file {path}: {source}")]
    BroadcastRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The broadcast file is not valid broadcast JSON
    #[error("Invalid broadcast JSON: {0}")]
    BroadcastJson(#[source] serde_json::Error),

    /// The script output JSON could not be deserialized
    #[error("Invalid script output JSON: {0}")]
    ScriptOutput(#[source] serde_json::Error),

    /// No JSON result object was found in the tool's stdout
    #[error("No script output JSON found in tool output")]
    MissingScriptOutput,
}

/// Registry store errors
///
/// A failed `apply` leaves both the in-memory registry and the files on disk
/// exactly as they were before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access to the state directory failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted registry document could not be parsed
    #[error("Corrupt registry file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the registry failed
    #[error("Failed to serialize registry: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A create targets an ID that already exists
    #[error("{kind} {id} already exists")]
    DuplicateId {
        kind: &'static str,
        id: String,
    },

    /// An update or delete targets an ID that does not exist
    #[error("{kind} {id} not found")]
    UnknownEntry {
        kind: &'static str,
        id: String,
    },

    /// Two deployments claim the same address on the same chain
    #[error("Address {address} on chain {chain_id} is already claimed by {existing} (conflicts with {id})")]
    AddressConflict {
        chain_id: u64,
        address: String,
        existing: String,
        id: String,
    },

    /// The registry lock was poisoned by a panicking writer
    #[error("Registry lock poisoned")]
    LockPoisoned,
}

/// Blockchain oracle errors
///
/// Returned by `BlockchainChecker` implementations. The pruner never
/// propagates these; an item whose check fails is kept.
#[derive(Debug, Error)]
pub enum CheckerError {
    /// Invalid or malformed RPC URL
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// The RPC request failed
    #[error("RPC request failed: {0}")]
    Rpc(String),
}

/// Prune execution errors
#[derive(Debug, Error)]
pub enum PruneError {
    /// Applying the delete changeset failed
    #[error("Failed to apply prune changeset: {0}")]
    Apply(#[from] StoreError),
}
