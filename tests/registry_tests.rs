mod common;

use std::fs;

use alloy::primitives::{address, b256, Bytes, B256};
use common::*;
use deploy_registry::{
    config::{DEPLOYMENTS_FILE, LOOKUP_FILE, SAFE_TXS_FILE, TRANSACTIONS_FILE},
    errors::StoreError,
    registry::{DeploymentFilter, SafeTransactionFilter, TransactionFilter},
    types::{
        DeploymentType, ProxyInfo, ProxyType, TransactionStatus, VerificationInfo,
        VerificationStatus,
    },
    utils::artifact_utils::InMemoryContractIndex,
    BuildContext, Changeset, ExecutionParser, RegistryConfig, RegistryStore, ScriptExecution,
};

const FILES: [&str; 4] = [DEPLOYMENTS_FILE, TRANSACTIONS_FILE, SAFE_TXS_FILE, LOOKUP_FILE];

fn open(dir: &tempfile::TempDir) -> RegistryStore {
    RegistryStore::open(RegistryConfig::new(dir.path())).unwrap()
}

fn counter_run(location: alloy::primitives::Address, hash: B256) -> ScriptExecution {
    let data = [0x01, 0x02];
    let output = output(vec![
        simulated(tx_id(hash[0]), DEPLOYER, FACTORY, &data),
        deployed(tx_id(hash[0]), location, "src/Counter.sol:Counter", "v1", "CREATE3"),
    ]);
    let broadcast = broadcast_json(&[Broadcast {
        hash,
        from: DEPLOYER,
        to: FACTORY,
        input: Bytes::copy_from_slice(&data),
        block: 42,
        status: 1,
    }]);
    ExecutionParser::new(InMemoryContractIndex::new())
        .parse(&output, Some(broadcast.as_slice()), "anvil", CHAIN_ID)
        .unwrap()
}

fn read_files(config: &RegistryConfig) -> Vec<Vec<u8>> {
    FILES.iter().map(|name| fs::read(config.file(name)).unwrap()).collect()
}

#[test]
fn test_record_execution_persists_all_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let hash = b256!("aaaa000000000000000000000000000000000000000000000000000000000000");

    let changeset = store
        .record_execution(&counter_run(COUNTER, hash), &BuildContext::new("default", now()))
        .unwrap();
    assert_eq!(changeset.create.deployments.len(), 1);
    assert_eq!(changeset.create.transactions.len(), 1);

    for name in FILES {
        assert!(store.config().file(name).exists(), "{name} missing");
    }

    let lookup: serde_json::Value =
        serde_json::from_slice(&fs::read(store.config().file(LOOKUP_FILE)).unwrap()).unwrap();
    let address: alloy::primitives::Address =
        serde_json::from_value(lookup["31337"]["default"]["Counter:v1"].clone()).unwrap();
    assert_eq!(address, COUNTER);

    // Documents are two-space indented
    let raw = fs::read_to_string(store.config().file(DEPLOYMENTS_FILE)).unwrap();
    assert!(raw.starts_with("{\n  \""));

    let reopened = open(&dir);
    let deployment = reopened.get_deployment("default/31337/Counter:v1").unwrap();
    assert_eq!(deployment.address, COUNTER);
    assert_eq!(reopened.get_transaction(&deployment.transaction_id).unwrap().hash, Some(hash));
    assert_eq!(reopened.snapshot(), store.snapshot());
}

#[test]
fn test_rerun_does_not_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let hash = b256!("aaaa000000000000000000000000000000000000000000000000000000000000");
    let ctx = BuildContext::new("default", now());

    store.record_execution(&counter_run(COUNTER, hash), &ctx).unwrap();
    let second = store.record_execution(&counter_run(COUNTER, hash), &ctx).unwrap();
    assert!(second.is_empty());
    assert_eq!(store.list_deployments(&DeploymentFilter::default()).len(), 1);
}

#[test]
fn test_same_identity_gets_hash_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let ctx = BuildContext::new("default", now());
    let first_hash = b256!("aaaa000000000000000000000000000000000000000000000000000000000000");
    let second_hash = b256!("bbbb000000000000000000000000000000000000000000000000000000000000");

    store.record_execution(&counter_run(COUNTER, first_hash), &ctx).unwrap();
    let other = address!("C000000000000000000000000000000000000002");
    let changeset = store.record_execution(&counter_run(other, second_hash), &ctx).unwrap();

    let id = &changeset.create.deployments[0].id;
    assert_ne!(id, "default/31337/Counter:v1");
    assert!(id.contains("bbbb"));
    assert_eq!(store.get_deployment_by_address(CHAIN_ID, &other).unwrap().id, *id);
}

#[test]
fn test_failed_flush_leaves_files_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let ctx = BuildContext::new("default", now());
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &ctx)
        .unwrap();

    let config = store.config().clone();
    let before = read_files(&config);
    let snapshot = store.snapshot();

    // A directory where a temporary file must go makes the write fail
    fs::create_dir(config.file(&format!("{SAFE_TXS_FILE}.tmp"))).unwrap();

    let mut changeset = Changeset::new();
    changeset.create.deployments.push(deployment(
        "default/31337/Other",
        address!("C000000000000000000000000000000000000009"),
        "",
    ));
    changeset
        .create
        .safe_transactions
        .push(safe_transaction(B256::repeat_byte(0x5f), false, None));

    let err = store.apply(&changeset).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));
    assert_eq!(read_files(&config), before);
    assert_eq!(store.snapshot(), snapshot);
    assert!(!config.file(&format!("{DEPLOYMENTS_FILE}.tmp")).exists());
    assert!(!config.file(&format!("{TRANSACTIONS_FILE}.tmp")).exists());
}

#[test]
fn test_failed_rename_keeps_memory_and_renamed_documents() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let ctx = BuildContext::new("default", now());
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &ctx)
        .unwrap();
    let config = store.config().clone();
    let snapshot = store.snapshot();

    // The last document cannot be renamed over a non-empty directory
    fs::remove_file(config.file(LOOKUP_FILE)).unwrap();
    fs::create_dir(config.file(LOOKUP_FILE)).unwrap();
    fs::write(config.file(LOOKUP_FILE).join("keep"), "x").unwrap();

    let mut changeset = Changeset::new();
    changeset.create.deployments.push(deployment(
        "default/31337/Other",
        address!("C000000000000000000000000000000000000009"),
        "",
    ));
    assert!(matches!(store.apply(&changeset), Err(StoreError::Io { .. })));

    assert_eq!(store.snapshot(), snapshot);
    let on_disk = fs::read_to_string(config.file(DEPLOYMENTS_FILE)).unwrap();
    assert!(on_disk.contains("default/31337/Other"));
    assert!(!config.file(&format!("{LOOKUP_FILE}.tmp")).exists());
}

#[test]
fn test_rejected_changeset_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &BuildContext::new("default", now()))
        .unwrap();
    let before = read_files(store.config());

    let mut changeset = Changeset::new();
    changeset
        .create
        .deployments
        .push(deployment("default/31337/Clash", COUNTER, ""));
    assert!(matches!(
        store.apply(&changeset),
        Err(StoreError::AddressConflict { .. })
    ));
    assert_eq!(read_files(store.config()), before);
    assert!(store.get_deployment("default/31337/Clash").is_none());
}

#[test]
fn test_rebuild_indexes_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &BuildContext::new("default", now()))
        .unwrap();

    store.rebuild_indexes().unwrap();
    let first = store.snapshot().indexes().clone();
    store.rebuild_indexes().unwrap();
    assert_eq!(store.snapshot().indexes(), &first);
}

#[test]
fn test_tags_and_verification() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &BuildContext::new("default", now()))
        .unwrap();
    let id = "default/31337/Counter:v1";

    store.add_tag(id, "core").unwrap();
    store.add_tag(id, "core").unwrap();
    assert_eq!(store.get_deployment(id).unwrap().tags, vec!["core"]);

    store
        .update_verification(
            id,
            VerificationInfo {
                status: VerificationStatus::Verified,
                explorer_url: Some("https://explorer.example/address/0xc0".into()),
                ..Default::default()
            },
        )
        .unwrap();
    store.remove_tag(id, "core").unwrap();

    let reopened = open(&dir);
    let deployment = reopened.get_deployment(id).unwrap();
    assert!(deployment.tags.is_empty());
    assert_eq!(deployment.verification.status, VerificationStatus::Verified);

    assert!(matches!(
        store.add_tag("default/31337/Missing", "x"),
        Err(StoreError::UnknownEntry { .. })
    ));
}

#[test]
fn test_concurrent_tag_edits_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .record_execution(&counter_run(COUNTER, B256::repeat_byte(0xaa)), &BuildContext::new("default", now()))
        .unwrap();
    let id = "default/31337/Counter:v1";
    let barrier = std::sync::Barrier::new(8);

    std::thread::scope(|scope| {
        for n in 0..8 {
            let (store, barrier) = (&store, &barrier);
            scope.spawn(move || {
                barrier.wait();
                store.add_tag(id, &format!("tag-{n}")).unwrap();
            });
        }
    });
    store
        .update_verification(id, VerificationInfo { status: VerificationStatus::Verified, ..Default::default() })
        .unwrap();

    let mut tags = open(&dir).get_deployment(id).unwrap().tags;
    tags.sort();
    let expected: Vec<String> = (0..8).map(|n| format!("tag-{n}")).collect();
    assert_eq!(tags, expected);
    assert_eq!(store.get_deployment(id).unwrap().tags.len(), 8);
}

#[test]
fn test_lookups_and_filters() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);

    let implementation = address!("1111111111111111111111111111111111111111");
    let proxy_address = address!("2222222222222222222222222222222222222222");
    let mut proxy = deployment("default/31337/CounterProxy", proxy_address, "tx-1");
    proxy.deployment_type = DeploymentType::Proxy;
    proxy.proxy_info = Some(ProxyInfo {
        proxy_type: ProxyType::Uups,
        implementation,
        admin: None,
        beacon: None,
        history: Vec::new(),
    });
    let mut staging = deployment("staging/31337/Counter", address!("3333333333333333333333333333333333333333"), "");
    staging.namespace = "staging".into();

    let mut changeset = Changeset::new();
    changeset.create.deployments = vec![
        deployment("default/31337/Counter", implementation, "tx-1"),
        proxy,
        staging,
    ];
    changeset.create.transactions = vec![
        transaction("tx-1", TransactionStatus::Executed, Some(B256::repeat_byte(1)), Some(1)),
        transaction("tx-2", TransactionStatus::Queued, None, None),
    ];
    changeset.create.safe_transactions = vec![
        safe_transaction(B256::repeat_byte(0x51), false, None),
        safe_transaction(B256::repeat_byte(0x52), true, Some(B256::repeat_byte(2))),
    ];
    store.apply(&changeset).unwrap();

    let proxies = store.proxies_of("default/31337/Counter");
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].address, proxy_address);
    assert_eq!(store.implementation_of("default/31337/CounterProxy"), Some(implementation));

    assert_eq!(store.deployments_in_namespace("default", CHAIN_ID).len(), 2);
    assert_eq!(store.deployments_in_namespace("staging", CHAIN_ID).len(), 1);
    assert!(store.deployments_in_namespace("staging", 1).is_empty());

    let filter = DeploymentFilter::default().deployment_type(DeploymentType::Proxy);
    assert_eq!(store.list_deployments(&filter).len(), 1);
    let filter = DeploymentFilter::default().contract_name("Counter").namespace("default");
    assert_eq!(store.list_deployments(&filter).len(), 1);

    let queued = store.list_transactions(&TransactionFilter::default().status(TransactionStatus::Queued));
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].id, "tx-2");

    let pending = store.pending_safe_transactions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].safe_tx_hash, B256::repeat_byte(0x51));
    let executed = store.list_safe_transactions(&SafeTransactionFilter::default().executed(true));
    assert_eq!(executed.len(), 1);

    let key = format!("{:#x}", B256::repeat_byte(0x52));
    assert!(store.get_safe_transaction(&key).unwrap().executed);
}
