//! In-memory list filters
//!
//! Every field is optional; `None` matches everything.

use crate::types::{Deployment, DeploymentType, SafeTransaction, Transaction, TransactionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentFilter {
    pub namespace: Option<String>,
    pub chain_id: Option<u64>,
    pub contract_name: Option<String>,
    pub label: Option<String>,
    pub deployment_type: Option<DeploymentType>,
}

impl DeploymentFilter {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn contract_name(mut self, name: impl Into<String>) -> Self {
        self.contract_name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn deployment_type(mut self, deployment_type: DeploymentType) -> Self {
        self.deployment_type = Some(deployment_type);
        self
    }

    pub fn matches(&self, deployment: &Deployment) -> bool {
        self.namespace.as_ref().map_or(true, |ns| &deployment.namespace == ns)
            && self.chain_id.map_or(true, |id| deployment.chain_id == id)
            && self.contract_name.as_ref().map_or(true, |name| &deployment.contract_name == name)
            && self.label.as_ref().map_or(true, |label| &deployment.label == label)
            && self.deployment_type.map_or(true, |ty| deployment.deployment_type == ty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub chain_id: Option<u64>,
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.chain_id.map_or(true, |id| transaction.chain_id == id)
            && self.status.map_or(true, |status| transaction.status == status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeTransactionFilter {
    pub chain_id: Option<u64>,
    pub executed: Option<bool>,
}

impl SafeTransactionFilter {
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn executed(mut self, executed: bool) -> Self {
        self.executed = Some(executed);
        self
    }

    pub fn matches(&self, safe_tx: &SafeTransaction) -> bool {
        self.chain_id.map_or(true, |id| safe_tx.chain_id == id)
            && self.executed.map_or(true, |executed| safe_tx.executed == executed)
    }
}
