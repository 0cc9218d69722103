//! Shared fixtures for integration tests
//!
//! Logs are produced by ABI-encoding the same `sol!` bindings the decoder
//! uses, so fixtures always match the wire layout.

#![allow(dead_code)]

use alloy::{
    primitives::{address, Address, Bytes, B256, U256},
    sol_types::{SolCall, SolEvent},
};
use chrono::{DateTime, TimeZone, Utc};
use deploy_registry::{
    events::abi,
    trace::ScriptOutput,
    types::{
        ArtifactInfo, CreateMethod, Deployment, DeploymentStrategy, DeploymentType,
        SafeTransaction, Transaction, TransactionStatus, VerificationInfo,
    },
    RawLog,
};
use serde_json::json;

pub const CHAIN_ID: u64 = 31337;
pub const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const FACTORY: Address = address!("ba5Ed099633D3B313e4D5F7bdc1305d3c28ba5Ed");
pub const COUNTER: Address = address!("C000000000000000000000000000000000000001");
pub const SAFE: Address = address!("5afe00000000000000000000000000000000cafe");
pub const LIBRARY_EMITTER: Address = address!("00000000000000000000000000000000000de910");

/// Installs a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn tx_id(n: u8) -> B256 {
    B256::with_last_byte(n)
}

fn to_raw(address: Address, event: &impl SolEvent) -> RawLog {
    let data = event.encode_log_data();
    RawLog {
        address,
        topics: data.topics().to_vec(),
        data: data.data.clone(),
    }
}

pub fn simulated(id: B256, sender: Address, to: Address, data: &[u8]) -> RawLog {
    to_raw(
        LIBRARY_EMITTER,
        &abi::TransactionSimulated {
            simulatedTx: abi::SimulatedTransaction {
                transactionId: id,
                senderId: "deployer".into(),
                sender,
                returnData: Bytes::new(),
                transaction: abi::SimulatedCall {
                    label: String::new(),
                    to,
                    data: Bytes::copy_from_slice(data),
                    value: U256::ZERO,
                },
            },
        },
    )
}

pub fn deployed(id: B256, location: Address, artifact: &str, label: &str, strategy: &str) -> RawLog {
    to_raw(
        LIBRARY_EMITTER,
        &abi::ContractDeployed {
            deployer: DEPLOYER,
            location,
            transactionId: id,
            deployment: abi::DeploymentDetails {
                artifact: artifact.into(),
                label: label.into(),
                entropy: format!("default/{}", label),
                salt: B256::repeat_byte(0x5a),
                bytecodeHash: B256::ZERO,
                initCodeHash: B256::repeat_byte(0x1c),
                constructorArgs: Bytes::new(),
                createStrategy: strategy.into(),
            },
        },
    )
}

pub fn safe_queued(hash: B256, ids: Vec<B256>) -> RawLog {
    to_raw(
        LIBRARY_EMITTER,
        &abi::SafeTransactionQueued {
            safeTxHash: hash,
            safe: SAFE,
            proposer: DEPLOYER,
            transactionIds: ids,
        },
    )
}

pub fn safe_executed(hash: B256, ids: Vec<B256>) -> RawLog {
    to_raw(
        LIBRARY_EMITTER,
        &abi::SafeTransactionExecuted {
            safeTxHash: hash,
            safe: SAFE,
            executor: DEPLOYER,
            transactionIds: ids,
        },
    )
}

pub fn proxy_deployed(proxy: Address, implementation: Address) -> RawLog {
    to_raw(LIBRARY_EMITTER, &abi::ProxyDeployed { proxy, implementation })
}

pub fn admin_changed(proxy: Address, new_admin: Address) -> RawLog {
    to_raw(
        proxy,
        &abi::AdminChanged {
            previousAdmin: Address::ZERO,
            newAdmin: new_admin,
        },
    )
}

/// Call data of a Safe `execTransaction`
pub fn exec_transaction_input() -> Bytes {
    abi::execTransactionCall {
        to: COUNTER,
        value: U256::ZERO,
        data: Bytes::new(),
        operation: 0,
        safeTxGas: U256::ZERO,
        baseGas: U256::ZERO,
        gasPrice: U256::ZERO,
        gasToken: Address::ZERO,
        refundReceiver: Address::ZERO,
        signatures: Bytes::new(),
    }
    .abi_encode()
    .into()
}

pub fn output(logs: Vec<RawLog>) -> ScriptOutput {
    ScriptOutput {
        success: true,
        raw_logs: logs,
        ..Default::default()
    }
}

/// One broadcast entry with its receipt
pub struct Broadcast {
    pub hash: B256,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub block: u64,
    pub status: u64,
}

pub fn broadcast_json(entries: &[Broadcast]) -> Vec<u8> {
    let transactions: Vec<_> = entries
        .iter()
        .map(|e| {
            json!({
                "hash": e.hash,
                "transactionType": "CALL",
                "contractName": null,
                "contractAddress": null,
                "transaction": {
                    "from": e.from,
                    "to": e.to,
                    "gas": "0x1e8480",
                    "value": "0x0",
                    "input": e.input,
                    "nonce": "0x0",
                },
                "additionalContracts": [],
            })
        })
        .collect();
    let receipts: Vec<_> = entries
        .iter()
        .map(|e| {
            json!({
                "status": format!("{:#x}", e.status),
                "transactionHash": e.hash,
                "blockNumber": format!("{:#x}", e.block),
                "gasUsed": "0x5208",
                "logs": [],
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "transactions": transactions,
        "receipts": receipts,
        "chain": CHAIN_ID,
        "timestamp": 1717243200,
    }))
    .unwrap()
}

pub fn deployment(id: &str, address: Address, transaction_id: &str) -> Deployment {
    Deployment {
        id: id.to_string(),
        namespace: "default".into(),
        chain_id: CHAIN_ID,
        contract_name: id.rsplit('/').next().unwrap_or(id).split(':').next().unwrap_or(id).to_string(),
        label: id.rsplit_once(':').map(|(_, label)| label.to_string()).unwrap_or_default(),
        address,
        deployment_type: DeploymentType::Singleton,
        transaction_id: transaction_id.to_string(),
        deployment_strategy: DeploymentStrategy {
            method: CreateMethod::Create,
            salt: None,
            init_code_hash: None,
            constructor_args: Bytes::new(),
            factory: None,
            entropy: String::new(),
        },
        proxy_info: None,
        artifact: ArtifactInfo::default(),
        verification: VerificationInfo::default(),
        tags: Vec::new(),
        created_at: now(),
        updated_at: now(),
    }
}

pub fn transaction(id: &str, status: TransactionStatus, hash: Option<B256>, block: Option<u64>) -> Transaction {
    Transaction {
        id: id.to_string(),
        chain_id: CHAIN_ID,
        hash,
        status,
        block_number: block,
        gas_used: None,
        sender: DEPLOYER,
        to: Some(FACTORY),
        value: U256::ZERO,
        data: Bytes::new(),
        deployments: Vec::new(),
        safe_context: None,
        environment: "default".into(),
        created_at: now(),
    }
}

pub fn safe_transaction(hash: B256, executed: bool, execution: Option<B256>) -> SafeTransaction {
    SafeTransaction {
        safe_tx_hash: hash,
        safe_address: SAFE,
        chain_id: CHAIN_ID,
        proposer: DEPLOYER,
        transaction_ids: Vec::new(),
        executed,
        execution_tx_hash: execution,
        execution_block_number: None,
        proposed_at: now(),
        executed_at: None,
    }
}
