//! Subtree extraction from trace arenas
//!
//! A matched node is copied out of its arena together with every node below
//! it. Traversal is breadth-first; visited nodes receive new contiguous
//! indices in visiting order and all links are rewritten to those indices.

use std::collections::{HashMap, VecDeque};

use super::{TraceArena, TraceFragment, TraceNode};

/// Deep-copies the subtree rooted at `root` into a self-contained fragment
///
/// # Arguments
/// * `arena` - Arena containing the subtree
/// * `root` - Arena index of the subtree root
///
/// # Returns
/// * `Some(TraceFragment)` - Fragment whose root (index 0) has no parent
/// * `None` - If `root` is not a valid index
///
/// Child indices that point outside the arena are dropped, and a node
/// reachable twice (a malformed, cyclic arena) is only copied once.
pub fn extract_subtree(arena: &TraceArena, root: usize) -> Option<TraceFragment> {
    arena.node(root)?;

    // First pass: visiting order, discovering parent of each visited node
    let mut order: Vec<(usize, Option<usize>)> = Vec::new();
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([(root, None)]);

    while let Some((old_idx, discovered_from)) = queue.pop_front() {
        if remap.contains_key(&old_idx) {
            continue;
        }
        let Some(node) = arena.node(old_idx) else {
            continue;
        };
        remap.insert(old_idx, order.len());
        order.push((old_idx, discovered_from));
        for &child in &node.children {
            if arena.node(child).is_some() && !remap.contains_key(&child) {
                queue.push_back((child, Some(old_idx)));
            }
        }
    }

    // Second pass: copy nodes with rewritten links
    let nodes = order
        .iter()
        .enumerate()
        .filter_map(|(new_idx, &(old_idx, discovered_from))| {
            let node = arena.node(old_idx)?;
            let parent = discovered_from.and_then(|p| remap.get(&p).copied());
            let mut children = Vec::with_capacity(node.children.len());
            for child in &node.children {
                if let Some(&mapped) = remap.get(child) {
                    // Only keep links to nodes first discovered through this node
                    if order[mapped].1 == Some(old_idx) && !children.contains(&mapped) {
                        children.push(mapped);
                    }
                }
            }
            Some(TraceNode {
                parent,
                children,
                idx: new_idx,
                trace: node.trace.clone(),
                logs: node.logs.clone(),
            })
        })
        .collect();

    Some(TraceFragment { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CallKind, CallTraceInfo};
    use alloy::primitives::{Address, Bytes, U256};

    fn node(idx: usize, parent: Option<usize>, children: Vec<usize>) -> TraceNode {
        TraceNode {
            parent,
            children,
            idx,
            trace: CallTraceInfo {
                depth: 0,
                success: true,
                caller: Address::ZERO,
                address: Address::with_last_byte(idx as u8),
                kind: CallKind::Call,
                value: U256::ZERO,
                data: Bytes::new(),
                output: Bytes::new(),
                gas_used: 0,
            },
            logs: Vec::new(),
        }
    }

    fn assert_self_contained(fragment: &TraceFragment) {
        assert_eq!(fragment.root().unwrap().parent, None);
        for (i, n) in fragment.nodes.iter().enumerate() {
            assert_eq!(n.idx, i);
            for &child in &n.children {
                assert!(child < fragment.len(), "dangling child index {child}");
                assert_eq!(fragment.nodes[child].parent, Some(i));
            }
            if i > 0 {
                let parent = n.parent.expect("non-root node must have a parent");
                assert!(fragment.nodes[parent].children.contains(&i));
            }
        }
    }

    #[test]
    fn test_extract_inner_subtree() {
        // 0 -> [1, 4]; 1 -> [2, 3]; 4 -> [5]
        let arena = TraceArena {
            arena: vec![
                node(0, None, vec![1, 4]),
                node(1, Some(0), vec![2, 3]),
                node(2, Some(1), vec![]),
                node(3, Some(1), vec![]),
                node(4, Some(0), vec![5]),
                node(5, Some(4), vec![]),
            ],
        };

        let fragment = extract_subtree(&arena, 1).unwrap();
        assert_eq!(fragment.len(), 3);
        assert_self_contained(&fragment);
        assert_eq!(fragment.nodes[0].children, vec![1, 2]);
        assert_eq!(fragment.nodes[1].trace.address, Address::with_last_byte(2));
        assert_eq!(fragment.nodes[2].trace.address, Address::with_last_byte(3));
    }

    #[test]
    fn test_extract_breadth_first_order() {
        // 0 -> [1, 2]; 1 -> [3]; 2 -> [4]
        let arena = TraceArena {
            arena: vec![
                node(0, None, vec![1, 2]),
                node(1, Some(0), vec![3]),
                node(2, Some(0), vec![4]),
                node(3, Some(1), vec![]),
                node(4, Some(2), vec![]),
            ],
        };

        let fragment = extract_subtree(&arena, 0).unwrap();
        let visited: Vec<u8> = fragment
            .nodes
            .iter()
            .map(|n| n.trace.address.0[19])
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert_self_contained(&fragment);
    }

    #[test]
    fn test_extract_tolerates_bad_links() {
        // 1 lists an out-of-range child and a back-edge to 0
        let arena = TraceArena {
            arena: vec![
                node(0, None, vec![1]),
                node(1, Some(0), vec![2, 9, 0]),
                node(2, Some(1), vec![]),
            ],
        };

        let fragment = extract_subtree(&arena, 0).unwrap();
        assert_eq!(fragment.len(), 3);
        assert_self_contained(&fragment);

        assert!(extract_subtree(&arena, 7).is_none());
    }
}
