//! Registry changesets
//!
//! A changeset groups every create, update and delete produced by one
//! operation (a parsed run, a prune, a tag edit) so the store can apply it
//! as a unit. It is built once, applied once and then discarded.

mod builder;

pub use builder::ChangesetBuilder;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{Deployment, SafeTransaction, Transaction};

/// Records of one operation kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBucket {
    pub deployments: Vec<Deployment>,
    pub transactions: Vec<Transaction>,
    pub safe_transactions: Vec<SafeTransaction>,
}

impl ChangeBucket {
    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty() && self.transactions.is_empty() && self.safe_transactions.is_empty()
    }

    /// Total number of records in the bucket
    pub fn len(&self) -> usize {
        self.deployments.len() + self.transactions.len() + self.safe_transactions.len()
    }
}

/// Grouped registry mutations, applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changeset {
    pub create: ChangeBucket,
    pub update: ChangeBucket,
    pub delete: ChangeBucket,
    /// Registry key → why the entry was selected (used for deletions)
    pub reasons: BTreeMap<String, String>,
}

impl Changeset {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Total number of records across all buckets
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }

    /// Queues a deletion together with its reason
    pub fn delete_deployment(&mut self, deployment: Deployment, reason: impl Into<String>) {
        self.reasons.insert(deployment.id.clone(), reason.into());
        self.delete.deployments.push(deployment);
    }

    pub fn delete_transaction(&mut self, transaction: Transaction, reason: impl Into<String>) {
        self.reasons.insert(transaction.id.clone(), reason.into());
        self.delete.transactions.push(transaction);
    }

    pub fn delete_safe_transaction(&mut self, safe_tx: SafeTransaction, reason: impl Into<String>) {
        self.reasons.insert(safe_tx.key(), reason.into());
        self.delete.safe_transactions.push(safe_tx);
    }

    /// Reason recorded for a registry key, if any
    pub fn reason(&self, key: &str) -> Option<&str> {
        self.reasons.get(key).map(String::as_str)
    }
}
