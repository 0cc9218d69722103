//! On-chain enrichment from the broadcast file
//!
//! Two passes, both in broadcast order:
//! 1. Each broadcast entry with a chain hash is paired with the first
//!    unenriched simulated transaction sharing its recipient, sender and
//!    call-data hash; the receipt then supplies block number and gas.
//! 2. Remaining entries calling the Safe `execTransaction` entry point are
//!    paired with the oldest executed, not yet enriched Safe batch of the
//!    same Safe. There is no stronger key linking the two.

use std::collections::HashSet;

use alloy::{primitives::keccak256, sol_types::SolCall};
use tracing::debug;

use super::types::{SafeBatch, ScriptTransaction};
use crate::broadcast::BroadcastFile;
use crate::events::abi::execTransactionCall;
use crate::types::TransactionStatus;

/// Matches broadcast entries to simulated transactions
///
/// # Returns
/// Indices of the broadcast entries that were consumed
pub fn enrich_transactions(
    transactions: &mut [ScriptTransaction],
    broadcast: &BroadcastFile,
) -> HashSet<usize> {
    let mut consumed = HashSet::new();

    for (i, entry) in broadcast.transactions.iter().enumerate() {
        let Some(hash) = entry.hash else {
            continue;
        };
        let Some(to) = entry.transaction.to else {
            continue;
        };
        let input_hash = entry.input_hash();

        let candidate = transactions.iter_mut().find(|tx| {
            tx.hash.is_none()
                && tx.to == to
                && tx.sender == entry.transaction.from
                && keccak256(&tx.data) == input_hash
        });
        let Some(tx) = candidate else {
            continue;
        };

        let receipt = broadcast.receipt(&hash);
        let failed = receipt.is_some_and(|r| !r.is_success());
        tx.advance(if failed {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Executed
        });
        tx.hash = Some(hash);
        if let Some(receipt) = receipt {
            tx.block_number = Some(receipt.block_number);
            tx.gas_used = receipt.gas_used;
        }
        consumed.insert(i);
        debug!(transaction_id = %tx.transaction_id, %hash, "transaction enriched from broadcast");
    }
    consumed
}

/// Matches Safe `execTransaction` broadcasts to executed Safe batches
///
/// Batched transactions that still lack a hash inherit the execution hash
/// and block number of their batch.
///
/// # Returns
/// Number of Safe batches enriched
pub fn enrich_safe_batches(
    batches: &mut [SafeBatch],
    transactions: &mut [ScriptTransaction],
    broadcast: &BroadcastFile,
    consumed: &HashSet<usize>,
) -> usize {
    let mut enriched = 0;

    for (i, entry) in broadcast.transactions.iter().enumerate() {
        if consumed.contains(&i) || !entry.has_selector(execTransactionCall::SELECTOR) {
            continue;
        }
        let (Some(hash), Some(safe)) = (entry.hash, entry.transaction.to) else {
            continue;
        };

        let Some(batch) = batches
            .iter_mut()
            .find(|b| b.executed && b.execution_hash.is_none() && b.safe == safe)
        else {
            debug!(%safe, %hash, "Safe execution without a matching executed batch");
            continue;
        };

        let block = broadcast.receipt(&hash).map(|r| r.block_number);
        batch.execution_hash = Some(hash);
        batch.execution_block = block;
        enriched += 1;

        for tx in transactions
            .iter_mut()
            .filter(|tx| batch.transaction_ids.contains(&tx.transaction_id) && tx.hash.is_none())
        {
            tx.hash = Some(hash);
            tx.block_number = block;
        }
    }
    enriched
}
