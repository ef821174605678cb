// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Buffer decision graphs.
//!
//! Every candidate solution remembers how it was built through a
//! reference to a decision node. Decisions form a DAG: many live
//! solutions share the same history, so nodes are reference-counted
//! and never copied while the DP runs.
//!
//! [`DecisionArena`] is the working graph of one DP sweep.
//! [`DecisionGraph`] is a compact, self-contained copy of the parts
//! still referenced by final solutions, which outlives the sweep.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Index of a decision inside a [`DecisionArena`].
pub type DecisionId = u32;

/// What a decision node records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionKind {
    /// a buffer of library type `cell` inserted on the edge
    /// between node `from` and node `to`.
    Buffer { cell: usize, from: u64, to: u64 },
    /// a pass-through merge of two branches.
    Merge,
}

/// One buffer insertion extracted from a decision graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferInsertion {
    pub from: u64,
    pub to: u64,
    pub cell: usize,
}

#[derive(Debug, Clone)]
struct DecisionNode {
    kind: DecisionKind,
    left: Option<DecisionId>,
    right: Option<DecisionId>,
    /// the number of solutions and decisions pointing here.
    /// zero means the slot is free.
    count: u32,
}

/// Read access to the nodes of a decision DAG.
pub trait DecisionSource {
    /// returns (kind, left, right) of a node.
    fn node(&self, id: u32) -> (DecisionKind, Option<u32>, Option<u32>);
}

/// Breadth-first listing of the buffer insertions below `root`.
///
/// Merge decisions are traversed but not reported.
pub fn buffer_insertions<S: DecisionSource>(
    src: &S, root: Option<u32>
) -> Vec<BufferInsertion> {
    let mut ret = Vec::new();
    let mut queue = VecDeque::new();
    queue.extend(root);
    while let Some(id) = queue.pop_front() {
        let (kind, left, right) = src.node(id);
        if let DecisionKind::Buffer { cell, from, to } = kind {
            ret.push(BufferInsertion { from, to, cell });
        }
        queue.extend(left);
        queue.extend(right);
    }
    ret
}

/// Reference-counted decision nodes addressed by index.
///
/// Ownership protocol: every `Some(id)` stored in a live solution or
/// in a live decision's `left`/`right` holds exactly one count.
/// [`DecisionArena::alloc`] takes over the references passed to it and
/// hands out a fresh one; [`DecisionArena::release`] drops one, freeing
/// nodes (and cascading to their children) when the count hits zero.
#[derive(Debug, Default)]
pub struct DecisionArena {
    nodes: Vec<DecisionNode>,
    free: Vec<DecisionId>,
    num_live: usize,
}

impl DecisionArena {
    pub fn new() -> DecisionArena {
        Default::default()
    }

    /// create a node with a count of one.
    ///
    /// the references in `left` and `right` are moved into the node.
    pub fn alloc(
        &mut self, kind: DecisionKind,
        left: Option<DecisionId>, right: Option<DecisionId>
    ) -> DecisionId {
        let node = DecisionNode { kind, left, right, count: 1 };
        self.num_live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as DecisionId
            }
        }
    }

    /// add one reference.
    #[inline]
    pub fn retain(&mut self, id: Option<DecisionId>) {
        if let Some(id) = id {
            let node = &mut self.nodes[id as usize];
            assert_ne!(node.count, 0, "retaining freed decision {}", id);
            node.count += 1;
        }
    }

    /// drop one reference, freeing everything that becomes unreachable.
    pub fn release(&mut self, id: Option<DecisionId>) {
        let mut stack = Vec::new();
        stack.extend(id);
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id as usize];
            assert_ne!(node.count, 0, "releasing freed decision {}", id);
            node.count -= 1;
            if node.count == 0 {
                stack.extend(node.left.take());
                stack.extend(node.right.take());
                self.free.push(id);
                self.num_live -= 1;
            }
        }
    }

    pub fn ref_count(&self, id: DecisionId) -> u32 {
        self.nodes[id as usize].count
    }

    pub fn is_live(&self, id: DecisionId) -> bool {
        self.ref_count(id) > 0
    }

    /// the number of allocated, not yet freed decisions.
    pub fn live_count(&self) -> usize {
        self.num_live
    }

    pub fn kind(&self, id: DecisionId) -> DecisionKind {
        self.nodes[id as usize].kind
    }

    /// the children of a live node.
    pub fn children(&self, id: DecisionId) -> (Option<DecisionId>, Option<DecisionId>) {
        let node = &self.nodes[id as usize];
        (node.left, node.right)
    }

    /// free every node at once.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.num_live = 0;
    }
}

impl DecisionSource for DecisionArena {
    fn node(&self, id: u32) -> (DecisionKind, Option<u32>, Option<u32>) {
        let node = &self.nodes[id as usize];
        (node.kind, node.left, node.right)
    }
}

/// A persisted decision node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDecision {
    pub kind: DecisionKind,
    pub left: Option<u32>,
    pub right: Option<u32>,
}

/// A self-contained decision DAG, detached from any arena.
///
/// Sharing between the imported roots is kept: a subgraph reachable
/// from several roots is stored once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionGraph {
    pub nodes: Vec<PersistedDecision>,
}

impl DecisionGraph {
    /// deep-copy the subgraph below `root` out of `arena`.
    ///
    /// `memo` maps arena ids to already copied nodes; pass the same map
    /// for every root of one net to keep structural sharing.
    pub fn import(
        &mut self,
        arena: &DecisionArena,
        root: Option<DecisionId>,
        memo: &mut HashMap<DecisionId, u32>,
    ) -> Option<u32> {
        let root = root?;
        // post-order without recursion: chains can be very deep
        // after wire segmentation.
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if memo.contains_key(&id) {
                continue
            }
            let (kind, left, right) = arena.node(id);
            if !expanded {
                stack.push((id, true));
                for child in [right, left].into_iter().flatten() {
                    if !memo.contains_key(&child) {
                        stack.push((child, false));
                    }
                }
                continue
            }
            self.nodes.push(PersistedDecision {
                kind,
                left: left.map(|l| memo[&l]),
                right: right.map(|r| memo[&r]),
            });
            memo.insert(id, (self.nodes.len() - 1) as u32);
        }
        Some(memo[&root])
    }
}

impl DecisionSource for DecisionGraph {
    fn node(&self, id: u32) -> (DecisionKind, Option<u32>, Option<u32>) {
        let node = &self.nodes[id as usize];
        (node.kind, node.left, node.right)
    }
}
