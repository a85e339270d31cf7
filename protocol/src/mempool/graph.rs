//! Dependency graph over pool-resident transactions.
//!
//! An edge `parent -> child` exists when `child` consumes an output of
//! `parent` and both are in the pool. Confirmed ancestors are never
//! represented. All traversals are iterative so that synthetic deep chains
//! cannot overflow the stack.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::transaction::TxId;

/// Parent/child adjacency between pool transactions.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Pool transactions whose outputs each transaction consumes.
    parents: HashMap<TxId, HashSet<TxId>>,

    /// Pool transactions consuming outputs of each transaction.
    children: HashMap<TxId, HashSet<TxId>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `child` to every pool-resident parent it spends from.
    /// Parents equal to `child` are ignored.
    pub fn add<I>(&mut self, child: TxId, parents: I)
    where
        I: IntoIterator<Item = TxId>,
    {
        for parent in parents {
            if parent == child {
                continue;
            }
            self.children.entry(parent).or_default().insert(child);
            self.parents.entry(child).or_default().insert(parent);
        }
    }

    /// Removes `id` and every edge touching it. Children of `id` stay in
    /// the graph; they simply lose the edge.
    pub fn remove(&mut self, id: &TxId) {
        if let Some(parents) = self.parents.remove(id) {
            for parent in parents {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.remove(id);
                    if siblings.is_empty() {
                        self.children.remove(&parent);
                    }
                }
            }
        }

        if let Some(children) = self.children.remove(id) {
            for child in children {
                if let Some(others) = self.parents.get_mut(&child) {
                    others.remove(id);
                    if others.is_empty() {
                        self.parents.remove(&child);
                    }
                }
            }
        }
    }

    /// Direct pool parents of `id`.
    pub fn parents(&self, id: &TxId) -> impl Iterator<Item = &TxId> {
        self.parents.get(id).into_iter().flatten()
    }

    /// Direct pool children of `id`.
    pub fn children(&self, id: &TxId) -> impl Iterator<Item = &TxId> {
        self.children.get(id).into_iter().flatten()
    }

    /// Every transaction reachable from `id` along child edges, in
    /// breadth-first order. `id` itself is not included.
    pub fn descendants(&self, id: &TxId) -> Vec<TxId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<TxId> = self.children(id).copied().collect();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            queue.extend(self.children(&next).copied());
        }
        order
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.parents.values().map(HashSet::len).sum()
    }

    /// Returns `true` if the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty()
    }
}
