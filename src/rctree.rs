// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! RC routing tree of one net.
//!
//! Nodes live in an arena and refer to each other by index. The arena
//! owns every node; it is dropped when the net's optimization is done.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// The role of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The driver pin. Exactly one per tree, always at index 0.
    Source,
    /// A branching point that is not allowed to hold a buffer.
    Internal,
    /// A Steiner or segmentation point eligible for buffer insertion.
    Candidate,
    /// A leaf load with a required arrival time.
    Sink,
}

/// Timing constraint and load of a sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkLoad {
    pub required_time: f64,
    /// load capacitance, in pF.
    pub capacitance: f64,
}

#[derive(Debug, Clone)]
pub struct RcNode {
    /// external identifier, unique across the design.
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
    /// per-unit resistance of the wire model governing this node.
    pub r0: f64,
    /// per-unit capacitance of the wire model governing this node.
    pub c0: f64,
    /// accumulated downstream capacitance.
    pub c_down: f64,
    /// capacitance of the edge to the parent.
    pub c_edge: f64,
    /// resistance of the edge to the parent.
    pub r_edge: f64,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub sink: Option<SinkLoad>,
}

/// An RC tree rooted at the source node (index 0).
#[derive(Debug, Clone)]
pub struct RcTree {
    pub nodes: Vec<RcNode>,
    /// wire unit resistance.
    pub r0: f64,
    /// wire unit capacitance.
    pub c0: f64,
}

impl RcTree {
    /// create a tree holding only its source node.
    pub fn new(source_id: u64, x: f64, y: f64, r0: f64, c0: f64) -> RcTree {
        let mut tree = RcTree { nodes: Vec::new(), r0, c0 };
        tree.add_node(source_id, x, y, NodeKind::Source, None);
        tree
    }

    pub const ROOT: usize = 0;

    /// add a detached node. connect it with [`RcTree::connect`].
    pub fn add_node(
        &mut self, id: u64, x: f64, y: f64,
        kind: NodeKind, sink: Option<SinkLoad>
    ) -> usize {
        self.nodes.push(RcNode {
            id, x, y, kind,
            r0: self.r0, c0: self.c0,
            c_down: sink.map(|s| s.capacitance).unwrap_or(0.0),
            c_edge: 0.0, r_edge: 0.0,
            parent: None, children: Vec::new(),
            sink,
        });
        self.nodes.len() - 1
    }

    pub fn add_sink(
        &mut self, id: u64, x: f64, y: f64,
        capacitance: f64, required_time: f64
    ) -> usize {
        self.add_node(id, x, y, NodeKind::Sink, Some(SinkLoad {
            required_time, capacitance
        }))
    }

    pub fn add_candidate(&mut self, id: u64, x: f64, y: f64) -> usize {
        self.add_node(id, x, y, NodeKind::Candidate, None)
    }

    /// link `child` under `parent`, deriving the edge R/C from the
    /// Manhattan distance and the unit wire model.
    pub fn connect(&mut self, parent: usize, child: usize) {
        let l = self.distance(parent, child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.r_edge = node.r0 * l;
        node.c_edge = node.c0 * l;
        self.nodes[parent].children.push(child);
    }

    /// Manhattan distance between two nodes.
    #[inline]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let (a, b) = (&self.nodes[a], &self.nodes[b]);
        (a.x - b.x).abs() + (a.y - b.y).abs()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// breadth-first order from the source.
    ///
    /// every parent precedes its children, so a reverse traversal is
    /// a valid bottom-up (post-order) sweep. nodes not reachable
    /// from the source are not listed.
    pub fn bfs_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([Self::ROOT]);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            queue.extend(self.nodes[i].children.iter().copied());
        }
        order
    }

    /// find a node index by its external id.
    pub fn find(&self, id: u64) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    pub fn max_id(&self) -> u64 {
        self.nodes.iter().map(|n| n.id).max().unwrap_or(0)
    }

    /// recompute `c_down` bottom-up: a node's own load plus its
    /// children's downstream and edge capacitance.
    pub fn accumulate_downstream_capacitance(&mut self) {
        for node in &mut self.nodes {
            node.c_down = node.sink.map(|s| s.capacitance).unwrap_or(0.0);
        }
        let order = self.bfs_order();
        for &child in order.iter().skip(1).rev() {
            let add = self.nodes[child].c_down + self.nodes[child].c_edge;
            if let Some(parent) = self.nodes[child].parent {
                self.nodes[parent].c_down += add;
            }
        }
    }
}

/// Hands out node identifiers that are never reused across the design.
///
/// Shared between workers, so it is lock-free.
#[derive(Debug)]
pub struct NodeIdAllocator {
    next: AtomicU64,
}

impl NodeIdAllocator {
    pub fn new(first_free: u64) -> NodeIdAllocator {
        NodeIdAllocator { next: AtomicU64::new(first_free) }
    }

    /// make sure ids up to `used` are never handed out.
    pub fn reserve_through(&self, used: u64) {
        self.next.fetch_max(used + 1, Ordering::Relaxed);
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
