//! Derived lookup indexes
//!
//! Indexes are a pure function of the source maps. They are always rebuilt
//! in full after a batch of mutations and never patched incrementally.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::Serialize;

use crate::errors::StoreError;
use crate::types::{Deployment, SafeTransaction};

/// Proxy ↔ implementation links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyIndex {
    /// Implementation deployment ID → proxy deployment IDs
    pub implementations: BTreeMap<String, Vec<String>>,
    /// Proxy deployment ID → implementation address
    pub proxy_to_impl: BTreeMap<String, Address>,
}

/// All derived indexes of a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupIndexes {
    /// Chain ID → lowercased address → deployment ID
    pub by_address: BTreeMap<u64, BTreeMap<String, String>>,
    /// Namespace → chain ID → deployment IDs in creation order
    pub by_namespace: BTreeMap<String, BTreeMap<u64, Vec<String>>>,
    /// Contract name → deployment IDs
    pub by_contract: BTreeMap<String, Vec<String>>,
    pub proxies: ProxyIndex,
    /// Hash keys of Safe transactions not yet executed
    pub pending_safe: Vec<String>,
}

impl LookupIndexes {
    /// Builds every index from the source maps
    ///
    /// # Returns
    /// * `Ok(LookupIndexes)` - Freshly built indexes
    /// * `Err(StoreError::AddressConflict)` - Two deployments share an address on one chain
    pub fn build(
        deployments: &BTreeMap<String, Deployment>,
        safe_transactions: &BTreeMap<String, SafeTransaction>,
    ) -> Result<Self, StoreError> {
        let mut indexes = LookupIndexes::default();

        let mut ordered: Vec<&Deployment> = deployments.values().collect();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        for deployment in &ordered {
            let by_chain = indexes.by_address.entry(deployment.chain_id).or_default();
            let address = deployment.address_key();
            if let Some(existing) = by_chain.get(&address) {
                return Err(StoreError::AddressConflict {
                    chain_id: deployment.chain_id,
                    address,
                    existing: existing.clone(),
                    id: deployment.id.clone(),
                });
            }
            by_chain.insert(address, deployment.id.clone());

            indexes
                .by_namespace
                .entry(deployment.namespace.clone())
                .or_default()
                .entry(deployment.chain_id)
                .or_default()
                .push(deployment.id.clone());
            indexes
                .by_contract
                .entry(deployment.contract_name.clone())
                .or_default()
                .push(deployment.id.clone());
        }

        // Second pass: implementations may be created after their proxies
        for deployment in &ordered {
            let Some(info) = &deployment.proxy_info else {
                continue;
            };
            indexes
                .proxies
                .proxy_to_impl
                .insert(deployment.id.clone(), info.implementation);

            let implementation_id = indexes
                .by_address
                .get(&deployment.chain_id)
                .and_then(|by_chain| by_chain.get(&format!("{:#x}", info.implementation)));
            if let Some(implementation_id) = implementation_id {
                indexes
                    .proxies
                    .implementations
                    .entry(implementation_id.clone())
                    .or_default()
                    .push(deployment.id.clone());
            }
        }

        indexes.pending_safe = safe_transactions
            .iter()
            .filter(|(_, safe_tx)| !safe_tx.executed)
            .map(|(key, _)| key.clone())
            .collect();

        Ok(indexes)
    }

    /// Deployment ID at an address
    pub fn deployment_at(&self, chain_id: u64, address: &Address) -> Option<&String> {
        self.by_address.get(&chain_id)?.get(&format!("{:#x}", address))
    }
}
