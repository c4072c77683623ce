//! Synthetic complete-tree exploration, used by the property tests and as a
//! cheap warmup workload.
//!
//! Every node of height `h > 0` has exactly `branching` children of height
//! `h - 1`; height-0 nodes are leaves. Totals have closed forms, which makes
//! conservation checks exact: a root of height `d` with branching `b` expands
//! `(b^(d+1) - 1) / (b - 1)` nodes, `b^d` of them leaves.

use serde::{Deserialize, Serialize};

use crate::bag::{Bag, ResultAccumulator};

/// A group of identical unexplored subtrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Group {
    height: u8,
    todo: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeResult {
    pub nodes: u64,
    pub leaves: u64,
}

impl ResultAccumulator for TreeResult {
    fn fold(&mut self, other: Self) {
        self.nodes += other.nodes;
        self.leaves += other.leaves;
    }
}

/// Pending synthetic-tree exploration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeBag {
    branching: u8,
    groups: Vec<Group>,
    nodes: u64,
    leaves: u64,
    parity: bool,
}

impl TreeBag {
    /// A single root subtree of the given height.
    pub fn new(branching: u8, height: u8) -> Self {
        Self {
            branching,
            groups: vec![Group { height, todo: 1 }],
            nodes: 0,
            leaves: 0,
            parity: false,
        }
    }

    pub fn empty(branching: u8) -> Self {
        Self {
            branching,
            groups: Vec::new(),
            nodes: 0,
            leaves: 0,
            parity: false,
        }
    }

    /// Expected node count for a full traversal of `new(branching, height)`.
    pub fn expected_nodes(branching: u8, height: u8) -> u64 {
        let b = branching as u64;
        (0..=height).map(|h| b.pow(h as u32)).sum()
    }

    /// Expected leaf count for a full traversal of `new(branching, height)`.
    pub fn expected_leaves(branching: u8, height: u8) -> u64 {
        (branching as u64).pow(height as u32)
    }

    fn step(&mut self) {
        let Some(top) = self.groups.last_mut() else {
            return;
        };
        top.todo -= 1;
        let height = top.height;
        if top.todo == 0 {
            self.groups.pop();
        }
        self.nodes += 1;
        if height == 0 {
            self.leaves += 1;
        } else {
            self.groups.push(Group {
                height: height - 1,
                todo: self.branching as u64,
            });
        }
    }
}

impl Bag for TreeBag {
    type Result = TreeResult;

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn is_splittable(&self) -> bool {
        self.groups.iter().any(|g| g.todo >= 2) || self.groups.len() >= 2
    }

    fn process(&mut self, amount: usize, _shared: &TreeResult) {
        for _ in 0..amount {
            if self.groups.is_empty() {
                return;
            }
            self.step();
        }
    }

    fn split(&mut self, take_all: bool) -> Self {
        if !self.is_splittable() {
            if take_all && !self.is_empty() {
                return Self {
                    branching: self.branching,
                    groups: std::mem::take(&mut self.groups),
                    nodes: 0,
                    leaves: 0,
                    parity: self.parity,
                };
            }
            return Self::empty(self.branching);
        }

        let mut out = Vec::new();
        for group in &mut self.groups {
            if group.todo >= 2 {
                let give = if self.parity {
                    group.todo.div_ceil(2)
                } else {
                    group.todo / 2
                };
                self.parity = !self.parity;
                group.todo -= give;
                out.push(Group {
                    height: group.height,
                    todo: give,
                });
            }
        }
        if out.is_empty() {
            // Two or more single-subtree groups: hand one group over.
            if let Some(group) = self.groups.pop() {
                out.push(group);
            }
        }
        Self {
            branching: self.branching,
            groups: out,
            nodes: 0,
            leaves: 0,
            parity: !self.parity,
        }
    }

    fn merge(&mut self, other: Self) {
        self.nodes += other.nodes;
        self.leaves += other.leaves;
        self.groups.extend(other.groups);
    }

    fn submit(&mut self, result: &mut TreeResult) {
        result.nodes += self.nodes;
        result.leaves += self.leaves;
        self.nodes = 0;
        self.leaves = 0;
    }
}
