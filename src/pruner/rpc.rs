//! `BlockchainChecker` backed by a JSON-RPC endpoint

use alloy::{
    network::{AnyNetwork, ReceiptResponse},
    primitives::{Address, B256},
    providers::{Provider, ProviderBuilder},
};

use crate::errors::CheckerError;
use crate::traits::BlockchainChecker;

/// Answers existence queries through an alloy provider
///
/// No timeout is applied here; configure one on the transport if needed.
#[derive(Debug, Clone)]
pub struct RpcChecker<P> {
    provider: P,
}

impl<P: Provider<AnyNetwork>> RpcChecker<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Connects to an HTTP(S) RPC endpoint
///
/// # Example
/// ```no_run
/// use deploy_registry::pruner::rpc::connect_http;
///
/// let checker = connect_http("http://localhost:8545")?;
/// # Ok::<(), deploy_registry::errors::CheckerError>(())
/// ```
pub fn connect_http(rpc_url: &str) -> Result<RpcChecker<impl Provider<AnyNetwork>>, CheckerError> {
    let url = rpc_url
        .parse()
        .map_err(|_| CheckerError::InvalidUrl(rpc_url.to_string()))?;
    let provider = ProviderBuilder::new().network::<AnyNetwork>().connect_http(url);
    Ok(RpcChecker::new(provider))
}

impl<P: Provider<AnyNetwork>> BlockchainChecker for RpcChecker<P> {
    async fn has_code(&self, address: Address) -> Result<bool, CheckerError> {
        let code = self
            .provider
            .get_code_at(address)
            .await
            .map_err(|e| CheckerError::Rpc(e.to_string()))?;
        Ok(!code.is_empty())
    }

    async fn transaction_block(&self, hash: B256) -> Result<Option<u64>, CheckerError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| CheckerError::Rpc(e.to_string()))?;
        Ok(receipt.and_then(|r| r.block_number()))
    }
}
