use std::collections::{HashMap, HashSet};

use crate::transaction_id::TransactionId;

/// Directed graph of "is blocked on" relations between transactions.
///
/// `edge(from, to)` means `from` is waiting on a lock currently held by
/// `to`. A single short-lived mutex guards the whole structure (see
/// `lock_table.rs`); nothing long-running happens while it is held.
pub(crate) struct WaitForGraph {
    graph: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self { graph: HashMap::new() }
    }

    pub(crate) fn add_edge(&mut self, from: TransactionId, to: TransactionId) {
        if from == to {
            return;
        }
        self.graph.entry(from).or_insert_with(HashSet::new).insert(to);
    }

    /// Remove every outgoing edge from `tx`. Called once `tx` has been
    /// granted its lock, or once it has been aborted.
    pub(crate) fn remove_outgoing(&mut self, tx: TransactionId) {
        self.graph.remove(&tx);
    }

    /// Depth-first search starting at `start`, using an explicit recursion
    /// stack rather than a flat visited set. A flat visited-only check is
    /// the bug the spec calls out (`SPEC_FULL.md` §9): it would mark a
    /// vertex "already seen" the first time any branch passes through it,
    /// silently missing cycles that revisit it from a different branch
    /// later. The recursion stack instead only signals a cycle when we
    /// revisit a vertex that is still an ancestor on the *current* path.
    pub(crate) fn has_cycle_from(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        self.dfs(start, &mut visited, &mut stack)
    }

    fn dfs(
        &self,
        tx: TransactionId,
        visited: &mut HashSet<TransactionId>,
        stack: &mut HashSet<TransactionId>,
    ) -> bool {
        if stack.contains(&tx) {
            return true;
        }
        if visited.contains(&tx) {
            return false;
        }
        visited.insert(tx);
        stack.insert(tx);

        if let Some(neighbors) = self.graph.get(&tx) {
            for &next in neighbors {
                if self.dfs(next, visited, stack) {
                    return true;
                }
            }
        }

        stack.remove(&tx);
        false
    }
}
