// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Wire segmentation.
//!
//! Long wires only offer buffer positions at their two ends. This pass
//! splits every wire into equal-impedance pieces, inserting candidate
//! nodes in between, with the piece count given by a closed-form
//! estimate of how many buffers could pay off on that wire.

use crate::library::BufferCell;
use crate::rctree::{NodeIdAllocator, NodeKind, RcTree};

/// Wires shorter than this are treated as zero-length.
const MIN_WIRE_LENGTH: f64 = 1e-6;

/// Closed-form estimate of the beneficial number of buffers on a wire.
///
/// `r`, `c` are per-unit wire parasitics and `l` the wire length.
/// `rb`, `cb`, `kb` are the buffer resistance, capacitance and delay.
/// The result is real-valued and may be negative or NaN for degenerate
/// inputs.
pub fn segment_estimate(
    r: f64, c: f64, l: f64,
    rb: f64, cb: f64, kb: f64,
    r_source: f64, c_down: f64
) -> f64 {
    let numerator = 2.0 * (r * c * l + r * (cb - c_down) - c * (rb - r_source)).powi(2);
    let denominator = r * c * (rb * cb + kb);
    -0.5 + (1.0 + numerator / denominator).sqrt()
}

/// The number of candidate nodes to insert on a wire: the largest
/// estimate over all (buffer, driver) pairs, evaluated with the full
/// and with zero downstream load, floored and capped.
pub fn segment_count(
    r: f64, c: f64, l: f64, c_down: f64,
    buffers: &[BufferCell], drivers: &[BufferCell],
    max_segments: usize
) -> usize {
    let mut k = 0usize;
    for buf in buffers {
        for drv in drivers {
            let full = segment_estimate(
                r, c, l, buf.resistance, buf.capacitance, buf.delay,
                drv.resistance, c_down);
            let empty = segment_estimate(
                r, c, l, buf.resistance, buf.capacitance, buf.delay,
                drv.resistance, 0.0);
            let est = full.max(empty).floor();
            // NaN compares false and leaves k untouched.
            if est >= 1.0 {
                k = k.max(est.min(max_segments as f64) as usize);
            }
        }
    }
    k.min(max_segments)
}

/// Segment every wire of the tree in place.
///
/// Returns the number of inserted candidate nodes. Node ids for new
/// nodes come from the design-wide allocator.
pub fn segment_wires(
    tree: &mut RcTree,
    buffers: &[BufferCell], drivers: &[BufferCell],
    max_segments: usize,
    ids: &NodeIdAllocator,
) -> usize {
    if max_segments == 0 || tree.len() < 3 {
        return 0
    }
    tree.accumulate_downstream_capacitance();
    let order = tree.bfs_order();
    let mut num_inserted = 0;
    for &child in order.iter().skip(1).rev() {
        let parent = match tree.nodes[child].parent {
            Some(p) => p,
            None => continue
        };
        let l = tree.distance(parent, child);
        if l < MIN_WIRE_LENGTH {
            continue
        }
        let r = tree.nodes[child].r_edge / l;
        let c = tree.nodes[child].c_edge / l;
        let k = segment_count(
            r, c, l, tree.nodes[child].c_down,
            buffers, drivers, max_segments);
        if k == 0 {
            continue
        }
        clilog::trace!("segmenting wire {} -> {} into {} pieces",
                       tree.nodes[parent].id, tree.nodes[child].id, k + 1);
        split_wire(tree, parent, child, k, r, c, ids);
        num_inserted += k;
    }
    num_inserted
}

/// replace the edge `parent -> child` by `k + 1` equal pieces.
fn split_wire(
    tree: &mut RcTree,
    parent: usize, child: usize, k: usize,
    r: f64, c: f64,
    ids: &NodeIdAllocator,
) {
    let pieces = (k + 1) as f64;
    let c_edge = tree.nodes[child].c_edge / pieces;
    let r_edge = tree.nodes[child].r_edge / pieces;
    tree.nodes[child].c_edge = c_edge;
    tree.nodes[child].r_edge = r_edge;
    let (cx, cy) = (tree.nodes[child].x, tree.nodes[child].y);
    let (px, py) = (tree.nodes[parent].x, tree.nodes[parent].y);

    let mut prev = child;
    for i in 1..=k {
        let step = i as f64 / pieces;
        let node = tree.add_node(
            ids.next_id(),
            cx - step * (cx - px), cy - step * (cy - py),
            NodeKind::Candidate, None);
        let c_down = tree.nodes[prev].c_down + c_edge;
        let n = &mut tree.nodes[node];
        n.r0 = r;
        n.c0 = c;
        n.c_down = c_down;
        n.c_edge = c_edge;
        n.r_edge = r_edge;
        n.children.push(prev);
        tree.nodes[prev].parent = Some(node);
        prev = node;
    }
    tree.nodes[prev].parent = Some(parent);
    for ch in &mut tree.nodes[parent].children {
        if *ch == child {
            *ch = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lib() -> (Vec<BufferCell>, Vec<BufferCell>) {
        (vec![BufferCell::new("buf", 0.01, 10.0, 200.0, 1.0)],
         vec![BufferCell::new("drv", 0.01, 10.0, 200.0, 0.0)])
    }

    #[test]
    fn estimate_matches_closed_form() {
        // rb == r_source so only the wire and load terms remain.
        let k = segment_estimate(0.1, 0.01, 1000.0, 200.0, 0.01, 10.0, 200.0, 0.05);
        let expect = -0.5 + (1.0 + 2.0 * 0.996f64.powi(2) / 0.012).sqrt();
        assert!((k - expect).abs() < 1e-9);
        let (buffers, drivers) = lib();
        assert_eq!(segment_count(0.1, 0.01, 1000.0, 0.05, &buffers, &drivers, 100), 12);
        assert_eq!(segment_count(0.1, 0.01, 1000.0, 0.05, &buffers, &drivers, 3), 3);
        assert_eq!(segment_count(0.1, 0.01, 1000.0, 0.05, &[], &drivers, 3), 0);
    }

    #[test]
    fn short_wires_are_untouched() {
        let (buffers, drivers) = lib();
        let mut tree = RcTree::new(0, 0.0, 0.0, 0.1, 0.01);
        let cand = tree.add_candidate(3, 1.0, 0.0);
        let s1 = tree.add_sink(1, 1.0, 1.0, 0.001, 0.0);
        let s2 = tree.add_sink(2, 2.0, 0.0, 0.001, 0.0);
        tree.connect(RcTree::ROOT, cand);
        tree.connect(cand, s1);
        tree.connect(cand, s2);
        let ids = NodeIdAllocator::new(4);
        assert_eq!(segment_wires(&mut tree, &buffers, &drivers, 8, &ids), 0);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.nodes[cand].children, vec![s1, s2]);
        assert_eq!(ids.next_id(), 4);
    }

    #[test]
    fn long_wires_get_evenly_spaced_candidates() {
        let (buffers, drivers) = lib();
        let mut tree = RcTree::new(0, 0.0, 0.0, 0.1, 0.01);
        let cand = tree.add_candidate(5, 1000.0, 0.0);
        let sink = tree.add_sink(1, 2000.0, 0.0, 0.05, 0.0);
        tree.connect(RcTree::ROOT, cand);
        tree.connect(cand, sink);
        let ids = NodeIdAllocator::new(6);
        assert_eq!(segment_wires(&mut tree, &buffers, &drivers, 2, &ids), 4);
        assert_eq!(tree.bfs_order().len(), 7);

        // sink -> first new node sits one third of the way back.
        let p = tree.nodes[sink].parent.unwrap();
        assert_eq!(tree.nodes[p].id, 6);
        assert_eq!(tree.nodes[p].kind, NodeKind::Candidate);
        assert!((tree.nodes[p].x - (2000.0 - 1000.0 / 3.0)).abs() < 1e-9);
        let pp = tree.nodes[p].parent.unwrap();
        assert_eq!(tree.nodes[pp].parent, Some(cand));
        assert_eq!(tree.nodes[cand].children, vec![pp]);

        let total_c = tree.nodes.iter().map(|n| n.c_edge).sum::<f64>();
        assert!((total_c - 20.0).abs() < 1e-9);
        for n in &tree.nodes {
            assert!(n.children.len() <= 1);
        }
    }

    #[test]
    fn two_node_net_is_not_segmented() {
        let (buffers, drivers) = lib();
        let mut tree = RcTree::new(0, 0.0, 0.0, 0.1, 0.01);
        let sink = tree.add_sink(1, 5000.0, 0.0, 0.05, 0.0);
        tree.connect(RcTree::ROOT, sink);
        let ids = NodeIdAllocator::new(2);
        assert_eq!(segment_wires(&mut tree, &buffers, &drivers, 4, &ids), 0);
        assert_eq!(tree.len(), 2);
    }
}
