//! N-Queens as a scheduler collaborator.
//!
//! The bag keeps an explicit exploration stack: one [`Level`] per open node
//! group, holding the shared board prefix and the unexplored candidate
//! columns beneath it. Splitting halves the candidates at every level with at
//! least two, copying the prefix down to the shallowest such level, so the
//! two fragments stay comparable in remaining size wherever the cut falls.
//!
//! Solution and node counts accumulate inside the bag and only move on
//! `merge` and `submit`; `split` never carries counts, so nothing is double
//! counted no matter how work migrates.

use serde::{Deserialize, Serialize};

use crate::bag::{Bag, ResultAccumulator};

/// One group of unexplored sibling branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Level {
    /// Queen columns for rows `0..prefix.len()`, shared by every candidate.
    prefix: Vec<u8>,
    /// Unexplored candidate columns for the next row.
    todo: Vec<u8>,
}

/// Folded output: solution count plus expanded tree-node count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueensResult {
    pub solutions: u64,
    pub nodes: u64,
}

impl ResultAccumulator for QueensResult {
    fn fold(&mut self, other: Self) {
        self.solutions += other.solutions;
        self.nodes += other.nodes;
    }
}

/// Pending N-Queens exploration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueensBag {
    n: u8,
    /// Active exploration stack, deepest group last.
    levels: Vec<Level>,
    /// Tree-disjoint fragments absorbed via `merge`, explored after the
    /// active stack drains.
    reserve: Vec<Vec<Level>>,
    solutions: u64,
    nodes: u64,
    /// Alternates floor/ceiling halves across splits.
    parity: bool,
}

impl QueensBag {
    /// Root bag for an `n x n` board.
    pub fn new(n: u8) -> Self {
        Self {
            n,
            levels: vec![Level {
                prefix: Vec::new(),
                todo: (0..n).collect(),
            }],
            reserve: Vec::new(),
            solutions: 0,
            nodes: 0,
            parity: false,
        }
    }

    /// Empty bag, suitable for backing a load-balancing queue.
    pub fn empty(n: u8) -> Self {
        Self {
            n,
            levels: Vec::new(),
            reserve: Vec::new(),
            solutions: 0,
            nodes: 0,
            parity: false,
        }
    }

    /// Expand one node: take one candidate off the deepest group, count it,
    /// and push its children (the valid placements one row further down).
    fn step(&mut self) {
        let Some(top) = self.levels.last_mut() else {
            return;
        };
        let Some(col) = top.todo.pop() else {
            self.levels.pop();
            return;
        };
        self.nodes += 1;
        let mut prefix = top.prefix.clone();
        prefix.push(col);
        if prefix.len() as u8 == self.n {
            self.solutions += 1;
        } else {
            let todo = valid_columns(&prefix, self.n);
            if !todo.is_empty() {
                self.levels.push(Level { prefix, todo });
            }
        }
        self.prune();
    }

    /// Drop exhausted groups off the top of the stack and promote a reserve
    /// fragment when the stack empties, so `is_empty` stays a cheap check.
    fn prune(&mut self) {
        loop {
            match self.levels.last() {
                Some(level) if level.todo.is_empty() => {
                    self.levels.pop();
                }
                Some(_) => return,
                None => match self.reserve.pop() {
                    Some(fragment) => self.levels = fragment,
                    None => return,
                },
            }
        }
    }
}

impl Bag for QueensBag {
    type Result = QueensResult;

    fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.reserve.is_empty()
    }

    fn is_splittable(&self) -> bool {
        let wide_level = self.levels.iter().any(|l| l.todo.len() >= 2);
        let active = !self.levels.is_empty();
        wide_level || self.reserve.len() >= 2 || (self.reserve.len() == 1 && active)
    }

    fn process(&mut self, amount: usize, _shared: &QueensResult) {
        for _ in 0..amount {
            if self.levels.is_empty() {
                return;
            }
            self.step();
        }
    }

    fn split(&mut self, take_all: bool) -> Self {
        if !self.is_splittable() {
            if take_all && !self.is_empty() {
                let mut fragment = Self {
                    n: self.n,
                    levels: std::mem::take(&mut self.levels),
                    reserve: std::mem::take(&mut self.reserve),
                    solutions: 0,
                    nodes: 0,
                    parity: self.parity,
                };
                fragment.prune();
                return fragment;
            }
            return Self::empty(self.n);
        }

        let mut out_levels = Vec::new();
        for level in &mut self.levels {
            let count = level.todo.len();
            if count >= 2 {
                let give = if self.parity {
                    count.div_ceil(2)
                } else {
                    count / 2
                };
                self.parity = !self.parity;
                let given = level.todo.split_off(count - give);
                out_levels.push(Level {
                    prefix: level.prefix.clone(),
                    todo: given,
                });
            }
        }
        let give_reserve = self.reserve.len() / 2;
        let mut out_reserve = self.reserve.split_off(self.reserve.len() - give_reserve);
        if out_levels.is_empty() && out_reserve.is_empty() {
            // Splittable only through a lone reserve fragment: hand it over.
            if let Some(fragment) = self.reserve.pop() {
                out_reserve.push(fragment);
            }
        }
        self.prune();
        // A fragment built purely from reserve entries has an empty active
        // stack; prune promotes one so `process` can make progress on it.
        let mut fragment = Self {
            n: self.n,
            levels: out_levels,
            reserve: out_reserve,
            solutions: 0,
            nodes: 0,
            parity: !self.parity,
        };
        fragment.prune();
        fragment
    }

    fn merge(&mut self, other: Self) {
        self.solutions += other.solutions;
        self.nodes += other.nodes;
        if !other.levels.is_empty() {
            self.reserve.push(other.levels);
        }
        self.reserve.extend(other.reserve);
        self.prune();
    }

    fn submit(&mut self, result: &mut QueensResult) {
        result.solutions += self.solutions;
        result.nodes += self.nodes;
        self.solutions = 0;
        self.nodes = 0;
    }
}

/// Columns in row `prefix.len()` not attacked by any placed queen.
fn valid_columns(prefix: &[u8], n: u8) -> Vec<u8> {
    let row = prefix.len();
    (0..n)
        .filter(|&col| {
            prefix.iter().enumerate().all(|(r, &placed)| {
                placed != col && (row - r) as u8 != placed.abs_diff(col)
            })
        })
        .collect()
}
