//! Matching simulated transactions against the call-trace arenas
//!
//! The simulation runs as the test harness, so a call that the script
//! attributes to some sender shows the harness as its raw caller. When the
//! call is immediately preceded (same parent) by a `prank(address)` call to
//! the cheat-code contract, the pranked address is the effective sender.

use std::collections::HashSet;

use alloy::{
    primitives::{address, Address},
    sol_types::SolCall,
};
use tracing::debug;

use super::types::ScriptTransaction;
use crate::events::abi::prankCall;
use crate::trace::{extract_subtree, TraceArena, TraceNode};

/// Address of the test framework's cheat-code contract
pub const CHEATCODE_ADDRESS: Address = address!("7109709ECfa91a80626fF3989D68f67F5b1DD12D");

/// Decodes the pranked sender if `node` is a `prank(address)` cheat-code call
pub fn pranked_sender(node: &TraceNode) -> Option<Address> {
    if node.trace.address != CHEATCODE_ADDRESS {
        return None;
    }
    let data = &node.trace.data;
    if data.len() < 4 || data[..4] != prankCall::SELECTOR {
        return None;
    }
    prankCall::abi_decode(data).ok().map(|call| call.msgSender)
}

/// Sender a node is logically attributed to
pub fn effective_sender(arena: &TraceArena, idx: usize) -> Option<Address> {
    let node = arena.node(idx)?;
    let pranked = arena.previous_sibling(idx).and_then(pranked_sender);
    Some(pranked.unwrap_or(node.trace.caller))
}

fn node_matches(arena: &TraceArena, idx: usize, tx: &ScriptTransaction) -> bool {
    let Some(node) = arena.node(idx) else {
        return false;
    };
    if node.trace.address == CHEATCODE_ADDRESS {
        return false;
    }
    if node.trace.kind.is_call() && node.trace.address != tx.to {
        return false;
    }
    node.trace.data == tx.data && effective_sender(arena, idx) == Some(tx.sender)
}

/// Attaches a trace fragment to every pending transaction that has a match
///
/// Transactions are visited in simulation order; each takes the first node,
/// across all arenas in order, that is not yet claimed by an earlier
/// transaction. Unmatched transactions keep `trace: None`.
///
/// # Returns
/// Number of transactions that received a fragment
pub fn match_traces<'a, I>(transactions: &mut [ScriptTransaction], arenas: I) -> usize
where
    I: IntoIterator<Item = &'a TraceArena>,
{
    let arenas: Vec<&TraceArena> = arenas.into_iter().collect();
    let mut claimed: HashSet<(usize, usize)> = HashSet::new();
    let mut matched = 0;

    for tx in transactions.iter_mut() {
        if tx.trace.is_some() || !tx.status.is_pending() {
            continue;
        }

        let found = arenas.iter().enumerate().find_map(|(a, arena)| {
            (0..arena.arena.len())
                .find(|&idx| !claimed.contains(&(a, idx)) && node_matches(arena, idx, tx))
                .map(|idx| (a, idx))
        });

        match found {
            Some((a, idx)) => {
                claimed.insert((a, idx));
                tx.trace = extract_subtree(arenas[a], idx);
                matched += 1;
            }
            None => debug!(
                transaction_id = %tx.transaction_id,
                to = %tx.to,
                "no trace node matches simulated transaction"
            ),
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CallKind, CallTraceInfo};
    use crate::types::TransactionStatus;
    use alloy::primitives::{b256, Bytes, U256};

    const HARNESS: Address = address!("1804c8AB1F12E6bbf3894d4083f33e07309d1f38");
    const DEPLOYER: Address = address!("00000000000000000000000000000000000000d0");
    const TARGET: Address = address!("00000000000000000000000000000000000000e0");
    const SCRIPT: Address = address!("00000000000000000000000000000000000000f0");

    fn node(idx: usize, parent: Option<usize>, children: Vec<usize>, caller: Address, to: Address, data: Bytes) -> TraceNode {
        TraceNode {
            parent,
            children,
            idx,
            trace: CallTraceInfo {
                depth: 0,
                success: true,
                caller,
                address: to,
                kind: CallKind::Call,
                value: U256::ZERO,
                data,
                output: Bytes::new(),
                gas_used: 0,
            },
            logs: Vec::new(),
        }
    }

    fn prank_data(who: Address) -> Bytes {
        prankCall { msgSender: who }.abi_encode().into()
    }

    fn tx(data: Bytes) -> ScriptTransaction {
        ScriptTransaction {
            transaction_id: b256!("0000000000000000000000000000000000000000000000000000000000000001"),
            sender_id: "deployer".into(),
            sender: DEPLOYER,
            to: TARGET,
            value: U256::ZERO,
            data,
            label: String::new(),
            return_data: Bytes::new(),
            status: TransactionStatus::Simulated,
            hash: None,
            block_number: None,
            gas_used: None,
            safe_tx_hash: None,
            safe_batch_index: None,
            trace: None,
        }
    }

    /// run() -> [prank(DEPLOYER), TARGET.call(data) -> [inner]]
    fn pranked_arena(data: Bytes) -> TraceArena {
        TraceArena {
            arena: vec![
                node(0, None, vec![1, 2], HARNESS, SCRIPT, Bytes::from(vec![0xc0, 0x40, 0x62, 0x26])),
                node(1, Some(0), vec![], SCRIPT, CHEATCODE_ADDRESS, prank_data(DEPLOYER)),
                node(2, Some(0), vec![3], SCRIPT, TARGET, data),
                node(3, Some(2), vec![], TARGET, DEPLOYER, Bytes::new()),
            ],
        }
    }

    #[test]
    fn test_prank_sets_effective_sender() {
        let arena = pranked_arena(Bytes::from(vec![1, 2, 3, 4]));
        assert_eq!(effective_sender(&arena, 2), Some(DEPLOYER));
        assert_eq!(effective_sender(&arena, 0), Some(HARNESS));
        assert_eq!(effective_sender(&arena, 3), Some(TARGET));
    }

    #[test]
    fn test_match_attaches_isolated_fragment() {
        let data = Bytes::from(vec![1, 2, 3, 4]);
        let arena = pranked_arena(data.clone());
        let mut txs = vec![tx(data)];

        assert_eq!(match_traces(&mut txs, [&arena]), 1);
        let fragment = txs[0].trace.as_ref().unwrap();
        assert_eq!(fragment.len(), 2);
        assert_eq!(fragment.nodes[0].parent, None);
        assert_eq!(fragment.nodes[0].trace.address, TARGET);
        assert_eq!(fragment.nodes[0].children, vec![1]);
        assert_eq!(fragment.nodes[1].parent, Some(0));
    }

    #[test]
    fn test_without_prank_sender_mismatch() {
        let data = Bytes::from(vec![9, 9]);
        let mut arena = pranked_arena(data.clone());
        // Replace the prank with an unrelated cheat-code call
        arena.arena[1].trace.data = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let mut txs = vec![tx(data)];

        assert_eq!(match_traces(&mut txs, [&arena]), 0);
        assert!(txs[0].trace.is_none());
    }

    #[test]
    fn test_identical_calls_claim_distinct_nodes() {
        let data = Bytes::from(vec![7]);
        let arena = TraceArena {
            arena: vec![
                node(0, None, vec![1, 2, 3, 4], HARNESS, SCRIPT, Bytes::new()),
                node(1, Some(0), vec![], SCRIPT, CHEATCODE_ADDRESS, prank_data(DEPLOYER)),
                node(2, Some(0), vec![], SCRIPT, TARGET, data.clone()),
                node(3, Some(0), vec![], SCRIPT, CHEATCODE_ADDRESS, prank_data(DEPLOYER)),
                node(4, Some(0), vec![], SCRIPT, TARGET, data.clone()),
            ],
        };
        let mut second = tx(data.clone());
        second.transaction_id = b256!("0000000000000000000000000000000000000000000000000000000000000002");
        let mut txs = vec![tx(data), second];

        assert_eq!(match_traces(&mut txs, [&arena]), 2);
        assert_eq!(txs[0].trace.as_ref().unwrap().len(), 1);
        assert_eq!(txs[1].trace.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_executed_transactions_skipped() {
        let data = Bytes::from(vec![1, 2, 3, 4]);
        let arena = pranked_arena(data.clone());
        let mut executed = tx(data);
        executed.status = TransactionStatus::Executed;
        let mut txs = vec![executed];

        assert_eq!(match_traces(&mut txs, [&arena]), 0);
    }
}
