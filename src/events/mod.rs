//! Decoding of raw logs into typed deployment events
//!
//! Most logs emitted by a script run are irrelevant to the registry. The
//! decoder recognizes a fixed table of event signatures and returns `None`
//! for everything else, including logs with missing or truncated topics and
//! payloads that fail ABI decoding. A single bad log never fails a parse.
//!
//! # Recognized Events
//! - `ContractDeployed` / `TransactionSimulated` from the deployer library
//! - `SafeTransactionQueued` / `SafeTransactionExecuted` for multisig batches
//! - `ProxyDeployed`, `Upgraded`, `AdminChanged`, `BeaconUpgraded` for proxies

pub mod abi;

use std::collections::HashMap;

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolEvent,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A log as emitted by the script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Emitting contract
    pub address: Address,
    /// Ordered topics; topic 0 is the event signature hash
    #[serde(default)]
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters
    #[serde(default)]
    pub data: Bytes,
}

/// Kinds of events in the signature table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContractDeployed,
    TransactionSimulated,
    SafeTransactionQueued,
    SafeTransactionExecuted,
    ProxyDeployed,
    Upgraded,
    AdminChanged,
    BeaconUpgraded,
}

/// Signature hash → event kind for every event the parser understands
static KNOWN_EVENTS: Lazy<HashMap<B256, EventKind>> = Lazy::new(|| {
    HashMap::from([
        (abi::ContractDeployed::SIGNATURE_HASH, EventKind::ContractDeployed),
        (abi::TransactionSimulated::SIGNATURE_HASH, EventKind::TransactionSimulated),
        (abi::SafeTransactionQueued::SIGNATURE_HASH, EventKind::SafeTransactionQueued),
        (abi::SafeTransactionExecuted::SIGNATURE_HASH, EventKind::SafeTransactionExecuted),
        (abi::ProxyDeployed::SIGNATURE_HASH, EventKind::ProxyDeployed),
        (abi::Upgraded::SIGNATURE_HASH, EventKind::Upgraded),
        (abi::AdminChanged::SIGNATURE_HASH, EventKind::AdminChanged),
        (abi::BeaconUpgraded::SIGNATURE_HASH, EventKind::BeaconUpgraded),
    ])
});

/// A contract deployment reported by the deployer library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDeployedEvent {
    pub deployer: Address,
    /// Address of the new contract
    pub location: Address,
    /// Internal ID of the owning simulated transaction
    pub transaction_id: B256,
    /// Artifact identifier, e.g. `src/Counter.sol:Counter`
    pub artifact: String,
    pub label: String,
    pub entropy: String,
    pub salt: B256,
    pub bytecode_hash: B256,
    pub init_code_hash: B256,
    pub constructor_args: Bytes,
    pub create_strategy: String,
}

/// A transaction recorded during simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSimulatedEvent {
    /// Opaque 32-byte ID assigned at simulation time
    pub transaction_id: B256,
    /// Logical sender name from the script configuration
    pub sender_id: String,
    pub sender: Address,
    pub label: String,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub return_data: Bytes,
}

/// A Safe batch being queued or executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeBatchEvent {
    pub safe_tx_hash: B256,
    pub safe: Address,
    /// Proposer for queued batches, executor for executed ones
    pub actor: Address,
    /// Internal IDs of the batched transactions, in batch order
    pub transaction_ids: Vec<B256>,
}

/// Typed domain events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    ContractDeployed(ContractDeployedEvent),
    TransactionSimulated(TransactionSimulatedEvent),
    SafeTransactionQueued(SafeBatchEvent),
    SafeTransactionExecuted(SafeBatchEvent),
    ProxyDeployed {
        proxy: Address,
        implementation: Address,
    },
    Upgraded {
        proxy: Address,
        implementation: Address,
    },
    AdminChanged {
        proxy: Address,
        previous_admin: Address,
        new_admin: Address,
    },
    BeaconUpgraded {
        proxy: Address,
        beacon: Address,
    },
}

/// Decodes raw logs against a table of event signatures
#[derive(Debug, Clone)]
pub struct EventDecoder {
    signatures: HashMap<B256, EventKind>,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self {
            signatures: KNOWN_EVENTS.clone(),
        }
    }
}

impl EventDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers an additional signature for a known event kind
    ///
    /// The log payload must still ABI-decode as the kind's canonical layout.
    pub fn with_signature(mut self, signature: B256, kind: EventKind) -> Self {
        self.signatures.insert(signature, kind);
        self
    }

    /// Event kind for a signature hash, if known
    pub fn kind_of(&self, signature: &B256) -> Option<EventKind> {
        self.signatures.get(signature).copied()
    }

    /// Decodes a single log
    ///
    /// # Returns
    /// * `Some(DomainEvent)` - The log is a recognized event
    /// * `None` - Unknown signature, missing topics or undecodable payload
    pub fn decode(&self, log: &RawLog) -> Option<DomainEvent> {
        let kind = self.kind_of(log.topics.first()?)?;
        let event = decode_kind(kind, log);
        if event.is_none() {
            debug!(
                address = %log.address,
                ?kind,
                topics = log.topics.len(),
                "skipping malformed log"
            );
        }
        event
    }

    /// Decodes every log, keeping emission order and dropping unrecognized ones
    pub fn decode_all<'a, I>(&self, logs: I) -> Vec<DomainEvent>
    where
        I: IntoIterator<Item = &'a RawLog>,
    {
        logs.into_iter().filter_map(|log| self.decode(log)).collect()
    }
}

/// Decodes an event with a canonical layout, ignoring the signature topic check
///
/// The signature was already matched through the table, which may contain
/// aliases, so topic 0 is replaced with the canonical hash before decoding.
fn decode_as<E: SolEvent>(log: &RawLog) -> Option<E> {
    let topics = std::iter::once(E::SIGNATURE_HASH).chain(log.topics.iter().skip(1).copied());
    E::decode_raw_log(topics, &log.data).ok()
}

fn decode_kind(kind: EventKind, log: &RawLog) -> Option<DomainEvent> {
    let event = match kind {
        EventKind::ContractDeployed => {
            let ev = decode_as::<abi::ContractDeployed>(log)?;
            let details = ev.deployment;
            DomainEvent::ContractDeployed(ContractDeployedEvent {
                deployer: ev.deployer,
                location: ev.location,
                transaction_id: ev.transactionId,
                artifact: details.artifact,
                label: details.label,
                entropy: details.entropy,
                salt: details.salt,
                bytecode_hash: details.bytecodeHash,
                init_code_hash: details.initCodeHash,
                constructor_args: details.constructorArgs,
                create_strategy: details.createStrategy,
            })
        }
        EventKind::TransactionSimulated => {
            let tx = decode_as::<abi::TransactionSimulated>(log)?.simulatedTx;
            DomainEvent::TransactionSimulated(TransactionSimulatedEvent {
                transaction_id: tx.transactionId,
                sender_id: tx.senderId,
                sender: tx.sender,
                label: tx.transaction.label,
                to: tx.transaction.to,
                data: tx.transaction.data,
                value: tx.transaction.value,
                return_data: tx.returnData,
            })
        }
        EventKind::SafeTransactionQueued => {
            let ev = decode_as::<abi::SafeTransactionQueued>(log)?;
            DomainEvent::SafeTransactionQueued(SafeBatchEvent {
                safe_tx_hash: ev.safeTxHash,
                safe: ev.safe,
                actor: ev.proposer,
                transaction_ids: ev.transactionIds,
            })
        }
        EventKind::SafeTransactionExecuted => {
            let ev = decode_as::<abi::SafeTransactionExecuted>(log)?;
            DomainEvent::SafeTransactionExecuted(SafeBatchEvent {
                safe_tx_hash: ev.safeTxHash,
                safe: ev.safe,
                actor: ev.executor,
                transaction_ids: ev.transactionIds,
            })
        }
        EventKind::ProxyDeployed => {
            let ev = decode_as::<abi::ProxyDeployed>(log)?;
            DomainEvent::ProxyDeployed {
                proxy: ev.proxy,
                implementation: ev.implementation,
            }
        }
        EventKind::Upgraded => {
            let ev = decode_as::<abi::Upgraded>(log)?;
            DomainEvent::Upgraded {
                proxy: log.address,
                implementation: ev.implementation,
            }
        }
        EventKind::AdminChanged => {
            let ev = decode_as::<abi::AdminChanged>(log)?;
            DomainEvent::AdminChanged {
                proxy: log.address,
                previous_admin: ev.previousAdmin,
                new_admin: ev.newAdmin,
            }
        }
        EventKind::BeaconUpgraded => {
            let ev = decode_as::<abi::BeaconUpgraded>(log)?;
            DomainEvent::BeaconUpgraded {
                proxy: log.address,
                beacon: ev.beacon,
            }
        }
    };
    Some(event)
}
