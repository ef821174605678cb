// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The van Ginneken buffer insertion engine.
//!
//! One bottom-up sweep over an [`RcTree`] keeps, at every node and for
//! each signal polarity, the Pareto frontier of (time, capacitance,
//! area). Wires degrade time by their Elmore delay, candidate nodes
//! offer buffer insertion, and branch points merge their children's
//! frontiers. At the source every frontier entry is combined with every
//! driver cell.

use crate::decision::{
    buffer_insertions, BufferInsertion, DecisionArena, DecisionKind
};
use crate::library::BufferCell;
use crate::pareto::{
    AscendingParetoList, AscendingTimeAreaList, CandidateSolution,
    DescendingParetoList, FinalSolution
};
use crate::rctree::{NodeIdAllocator, NodeKind, RcTree};
use crate::segment::segment_wires;
use crate::topology::OptimizerConfig;

/// Wires shorter than this carry no delay.
const MIN_WIRE_LENGTH: f64 = 1e-6;

/// One frontier per polarity. Index 0 is the non-inverted signal.
type NodeSolutions = [AscendingParetoList; 2];

/// Single-net optimizer.
///
/// Final solutions and their decision graph live inside the optimizer
/// until the next call to [`VanGinneken::optimize`].
pub struct VanGinneken<'lib> {
    buffers: &'lib [BufferCell],
    arena: DecisionArena,
    solutions: DescendingParetoList,
    pin_capacitance_limit: f64,
    max_solutions_per_node: usize,
}

impl<'lib> VanGinneken<'lib> {
    pub fn new(buffers: &'lib [BufferCell]) -> VanGinneken<'lib> {
        VanGinneken {
            buffers,
            arena: DecisionArena::new(),
            solutions: DescendingParetoList::new(),
            pin_capacitance_limit: f64::MAX,
            max_solutions_per_node: usize::MAX,
        }
    }

    pub fn with_config(
        buffers: &'lib [BufferCell], config: &OptimizerConfig
    ) -> VanGinneken<'lib> {
        let mut van = VanGinneken::new(buffers);
        van.pin_capacitance_limit = config.pin_capacitance_limit;
        van.max_solutions_per_node = config.max_solutions_per_node.max(1);
        van
    }

    /// Set the capacitance ceiling for returned solutions.
    ///
    /// Without `overwrite` the ceiling can only be tightened.
    pub fn set_pin_capacitance_limit(&mut self, limit: f64, overwrite: bool) {
        self.pin_capacitance_limit = match overwrite {
            true => limit,
            false => self.pin_capacitance_limit.min(limit)
        };
    }

    pub fn pin_capacitance_limit(&self) -> f64 {
        self.pin_capacitance_limit
    }

    pub fn set_max_solutions_per_node(&mut self, max: usize) {
        self.max_solutions_per_node = max.max(1);
    }

    pub fn max_solutions_per_node(&self) -> usize {
        self.max_solutions_per_node
    }

    pub fn buffers(&self) -> &'lib [BufferCell] {
        self.buffers
    }

    pub fn arena(&self) -> &DecisionArena {
        &self.arena
    }

    /// Run the sweep over `tree` and select among `drivers`.
    pub fn optimize(&mut self, tree: &RcTree, drivers: &[BufferCell]) {
        self.solutions.clear(&mut self.arena);
        self.arena.clear();

        let order = tree.bfs_order();
        if order.len() < tree.len() {
            clilog::warn!(OPT_UNREACHABLE,
                          "{} tree nodes unreachable from the source are ignored",
                          tree.len() - order.len());
        }
        let mut lists: Vec<NodeSolutions> = vec![Default::default(); tree.len()];
        let mut received = vec![false; tree.len()];

        for &v in order.iter().rev() {
            let node = &tree.nodes[v];
            if let Some(sink) = node.sink {
                let mut seed = NodeSolutions::default();
                seed[0].insert(CandidateSolution {
                    time: sink.required_time,
                    capacitance: sink.capacitance,
                    area: 0.,
                    inverted: false,
                    decision: None,
                }, &mut self.arena);
                self.absorb(&mut lists[v], &mut received[v], seed);
            }
            let parent = match node.parent {
                Some(p) => p,
                None => continue
            };
            // a dangling branch constrains nothing.
            if !received[v] {
                continue
            }
            let mut sols = std::mem::take(&mut lists[v]);
            if tree.distance(parent, v) >= MIN_WIRE_LENGTH {
                self.add_wire(&mut sols, node.r_edge, node.c_edge);
            }
            if tree.nodes[parent].kind == NodeKind::Candidate {
                self.add_buffer(&mut sols, tree.nodes[parent].id, node.id);
            }
            for list in &mut sols {
                list.enforce_limit(self.max_solutions_per_node, &mut self.arena);
            }
            self.absorb(&mut lists[parent], &mut received[parent], sols);
        }

        let mut root = std::mem::take(&mut lists[RcTree::ROOT]);
        // the driver is non-inverting.
        root[1].clear(&mut self.arena);
        self.select_drivers(&root[0], drivers);
        root[0].clear(&mut self.arena);

        clilog::debug!("{} final solutions, {} live decisions",
                       self.solutions.len(), self.arena.live_count());
    }

    /// move `incoming` into a node, merging with what the node holds.
    fn absorb(
        &mut self, target: &mut NodeSolutions, received: &mut bool,
        incoming: NodeSolutions
    ) {
        if !*received {
            *target = incoming;
            *received = true;
            return
        }
        for (cur, inc) in target.iter_mut().zip(incoming) {
            let held = std::mem::take(cur);
            *cur = self.merge(held, inc);
        }
    }

    /// Elmore update of every solution through a wire of total
    /// resistance `r` and capacitance `c`.
    fn add_wire(&mut self, sols: &mut NodeSolutions, r: f64, c: f64) {
        for list in sols.iter_mut() {
            for mut s in list.take() {
                s.time -= 0.5 * r * c + r * s.capacitance;
                s.capacitance += c;
                list.insert(s, &mut self.arena);
            }
        }
    }

    /// Offer every buffer type in front of every solution.
    ///
    /// Buffered candidates are generated from the unbuffered frontier
    /// only and are pruned per buffer type before joining it.
    fn add_buffer(&mut self, sols: &mut NodeSolutions, from: u64, to: u64) {
        let buffers = self.buffers;
        let mut staged = Vec::with_capacity(buffers.len() * 2);
        for (cell, buf) in buffers.iter().enumerate() {
            for polarity in 0..2 {
                let target = polarity ^ (buf.inverting as usize);
                let mut stage = AscendingTimeAreaList::new();
                for s in sols[polarity].iter() {
                    self.arena.retain(s.decision);
                    let decision = self.arena.alloc(
                        DecisionKind::Buffer { cell, from, to },
                        s.decision, None);
                    stage.insert(CandidateSolution {
                        time: s.time - buf.delay - buf.resistance * s.capacitance,
                        capacitance: buf.capacitance,
                        area: s.area + buf.area,
                        inverted: target == 1,
                        decision: Some(decision),
                    }, &mut self.arena);
                }
                staged.push((target, stage));
            }
        }
        for (target, mut stage) in staged {
            stage.drain_into(&mut sols[target], &mut self.arena);
        }
    }

    /// Streaming merge of two branches of the same polarity.
    ///
    /// `left` is the frontier the node already holds and `right` the
    /// incoming one. On equal head times the incoming head advances.
    /// Every merged solution gets its own merge decision. Both inputs
    /// are consumed and their references released.
    fn merge(
        &mut self, mut left: AscendingParetoList, mut right: AscendingParetoList
    ) -> AscendingParetoList {
        let (l, r) = (left.take(), right.take());
        let mut out = AscendingParetoList::new();
        let (mut i, mut j) = (0, 0);
        while i < l.len() && j < r.len() {
            let (x, y) = (l[i], r[j]);
            self.arena.retain(x.decision);
            self.arena.retain(y.decision);
            let decision = self.arena.alloc(DecisionKind::Merge, x.decision, y.decision);
            out.insert(CandidateSolution {
                time: x.time.min(y.time),
                capacitance: x.capacitance + y.capacitance,
                area: x.area + y.area,
                inverted: x.inverted,
                decision: Some(decision),
            }, &mut self.arena);
            if x.time < y.time {
                i += 1;
            }
            else {
                j += 1;
            }
        }
        for s in l.iter().chain(r.iter()) {
            self.arena.release(s.decision);
        }
        out
    }

    fn select_drivers(&mut self, root: &AscendingParetoList, drivers: &[BufferCell]) {
        for (driver, d) in drivers.iter().enumerate() {
            for s in root.iter() {
                self.arena.retain(s.decision);
                self.solutions.insert(FinalSolution {
                    time: s.time - d.resistance * s.capacitance - d.delay,
                    capacitance: s.capacitance,
                    area: s.area + d.area,
                    driver,
                    decision: s.decision,
                }, &mut self.arena);
            }
        }
    }

    /// Final solutions below the pin capacitance limit, by decreasing
    /// time.
    pub fn solutions(&self) -> Vec<FinalSolution> {
        self.solutions.iter()
            .filter(|s| s.capacitance < self.pin_capacitance_limit)
            .copied()
            .collect()
    }

    /// The returned solution with the largest time.
    pub fn best(&self) -> Option<FinalSolution> {
        self.solutions.iter()
            .find(|s| s.capacitance < self.pin_capacitance_limit)
            .copied()
    }

    pub fn buffer_insertions(&self, sol: &FinalSolution) -> Vec<BufferInsertion> {
        buffer_insertions(&self.arena, sol.decision)
    }
}

/// Segment the tree's wires, then optimize it.
///
/// Returns the number of candidate nodes added by segmentation.
pub fn segment_and_optimize(
    van: &mut VanGinneken,
    tree: &mut RcTree,
    drivers: &[BufferCell],
    max_segments: usize,
    ids: &NodeIdAllocator,
) -> usize {
    let inserted = segment_wires(tree, van.buffers(), drivers, max_segments, ids);
    van.optimize(tree, drivers);
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_wire_matches_closed_form() {
        let mut tree = RcTree::new(0, 0., 0., 0.01, 0.002);
        let sink = tree.add_sink(1, 30., 40., 0.05, 100.);
        tree.connect(RcTree::ROOT, sink);
        let drivers = vec![
            BufferCell::new("d0", 0.001, 5., 100., 2.),
            BufferCell::new("d1", 0.002, 10., 50., 4.),
        ];
        let mut van = VanGinneken::new(&[]);
        van.optimize(&tree, &drivers);
        let sols = van.solutions();
        assert_eq!(sols.len(), 2);
        // d1: 100 - 0.5*0.7*0.14 - 0.7*0.05 - 50*0.19 - 10
        assert_eq!(sols[0].driver, 1);
        assert!(close(sols[0].time, 80.416));
        assert!(close(sols[0].capacitance, 0.19));
        assert_eq!(sols[0].area, 4.);
        assert_eq!(sols[1].driver, 0);
        assert!(close(sols[1].time, 75.916));
        assert_eq!(sols[1].area, 2.);
        assert!(van.buffer_insertions(&sols[0]).is_empty());
        assert_eq!(van.arena().live_count(), 0);
    }

    #[test_case(10., 20.; "first sink tighter")]
    #[test_case(30., 5.; "second sink tighter")]
    fn merge_takes_min_time_and_sums_load(t1: f64, t2: f64) {
        let mut tree = RcTree::new(0, 0., 0., 0.1, 0.01);
        let s1 = tree.add_sink(1, 0., 0., 0.3, t1);
        let s2 = tree.add_sink(2, 0., 0., 0.2, t2);
        tree.connect(RcTree::ROOT, s1);
        tree.connect(RcTree::ROOT, s2);
        let drivers = vec![BufferCell::new("ideal", 0., 0., 0., 0.)];
        let mut van = VanGinneken::new(&[]);
        van.optimize(&tree, &drivers);
        let best = van.best().unwrap();
        assert_eq!(van.solutions().len(), 1);
        assert_eq!(best.time, t1.min(t2));
        assert!(close(best.capacitance, 0.5));
    }

    fn forced_buffer_tree() -> RcTree {
        let mut tree = RcTree::new(0, 0., 0., 0.1, 0.01);
        let cand = tree.add_candidate(2, 10., 0.);
        let sink = tree.add_sink(1, 110., 0., 1.0, 0.);
        tree.connect(RcTree::ROOT, cand);
        tree.connect(cand, sink);
        tree
    }

    #[test]
    fn buffer_is_required_under_capacitance_limit() {
        let tree = forced_buffer_tree();
        let buffers = vec![BufferCell::new("buf", 0.05, 1., 2., 3.)];
        let drivers = vec![BufferCell::new("drv", 0.01, 0.5, 1., 0.)];

        let mut van = VanGinneken::new(&buffers);
        van.optimize(&tree, &drivers);
        let all = van.solutions();
        assert_eq!(all.len(), 2);
        assert!(close(all[0].time, -19.65));
        assert!(close(all[0].capacitance, 2.1));
        assert!(van.buffer_insertions(&all[0]).is_empty());
        assert!(close(all[1].time, -20.75));
        assert!(close(all[1].capacitance, 0.15));
        assert_eq!(all[1].area, 3.);

        // without the buffer nothing meets the ceiling.
        let mut bare = VanGinneken::new(&[]);
        bare.set_pin_capacitance_limit(1.0, false);
        bare.optimize(&tree, &drivers);
        assert!(bare.best().is_none());

        van.set_pin_capacitance_limit(1.0, false);
        let best = van.best().unwrap();
        assert_eq!(van.solutions().len(), 1);
        assert_eq!(van.buffer_insertions(&best), vec![
            BufferInsertion { from: 2, to: 1, cell: 0 }
        ]);
        van.set_pin_capacitance_limit(10.0, false);
        assert_eq!(van.solutions().len(), 1);
        van.set_pin_capacitance_limit(10.0, true);
        assert_eq!(van.solutions().len(), 2);
    }

    #[test]
    fn config_bounds_frontiers() {
        let tree = forced_buffer_tree();
        let buffers = vec![BufferCell::new("buf", 0.05, 1., 2., 3.)];
        let drivers = vec![BufferCell::new("drv", 0.01, 0.5, 1., 0.)];

        let van = VanGinneken::with_config(&buffers, &OptimizerConfig::default());
        assert_eq!(van.max_solutions_per_node(), 4096);
        assert_eq!(van.pin_capacitance_limit(), f64::MAX);

        let config = OptimizerConfig {
            max_solutions_per_node: 1,
            pin_capacitance_limit: 5.,
            ..Default::default()
        };
        let mut van = VanGinneken::with_config(&buffers, &config);
        assert_eq!(van.pin_capacitance_limit(), 5.);
        van.optimize(&tree, &drivers);
        // only the fastest entry survives at the candidate.
        let sols = van.solutions();
        assert_eq!(sols.len(), 1);
        assert!(close(sols[0].time, -19.65));
    }

    #[test]
    fn inverter_pairs_restore_polarity() {
        // a single inverter leaves the root inverted, so only the
        // unbuffered solution reaches the driver.
        let tree = forced_buffer_tree();
        let buffers = vec![BufferCell::new("inverter", 0.05, 1., 2., 3.)];
        let drivers = vec![BufferCell::new("drv", 0.01, 0.5, 1., 0.)];
        let mut van = VanGinneken::new(&buffers);
        van.optimize(&tree, &drivers);
        let sols = van.solutions();
        assert_eq!(sols.len(), 1);
        assert!(close(sols[0].time, -19.65));
        assert_eq!(van.arena().live_count(), 0);
    }

    #[test]
    fn live_decisions_are_exactly_the_final_references() {
        let mut tree = RcTree::new(0, 0., 0., 0.1, 0.01);
        let c1 = tree.add_candidate(10, 50., 0.);
        let c2 = tree.add_candidate(11, 100., 0.);
        let s1 = tree.add_sink(1, 150., 0., 0.5, 0.);
        let s2 = tree.add_sink(2, 100., 60., 0.8, 5.);
        let s3 = tree.add_sink(3, 50., -40., 0.2, -3.);
        tree.connect(RcTree::ROOT, c1);
        tree.connect(c1, c2);
        tree.connect(c2, s1);
        tree.connect(c2, s2);
        tree.connect(c1, s3);
        let buffers = vec![
            BufferCell::new("big", 0.08, 1., 1., 4.),
            BufferCell::new("inverter", 0.03, 0.5, 3., 1.),
            BufferCell::new("small", 0.02, 1.5, 5., 1.),
        ];
        let drivers = vec![BufferCell::new("drv", 0.01, 0.5, 2., 0.)];
        let mut van = VanGinneken::new(&buffers);
        van.optimize(&tree, &drivers);
        let sols = van.solutions();
        assert!(!sols.is_empty());
        for w in sols.windows(2) {
            assert!(w[0].time >= w[1].time);
        }

        // count references by walking every final solution's graph.
        let mut reached = std::collections::HashMap::<u32, u32>::new();
        let mut stack = Vec::new();
        for s in &sols {
            stack.extend(s.decision);
        }
        let mut seen = std::collections::HashSet::new();
        for &d in &stack {
            *reached.entry(d).or_default() += 1;
        }
        while let Some(d) = stack.pop() {
            if !seen.insert(d) {
                continue
            }
            let (l, r) = van.arena().children(d);
            for c in [l, r].into_iter().flatten() {
                *reached.entry(c).or_default() += 1;
                stack.push(c);
            }
        }
        assert_eq!(reached.len(), van.arena().live_count());
        for (d, n) in reached {
            assert_eq!(van.arena().ref_count(d), n);
        }
    }

    #[test]
    fn segmentation_can_only_help() {
        let buffers = vec![BufferCell::new("buf", 0.01, 10., 200., 1.)];
        let drivers = vec![BufferCell::new("drv", 0.01, 10., 200., 0.)];
        let build = || {
            let mut tree = RcTree::new(0, 0., 0., 0.1, 0.01);
            let cand = tree.add_candidate(5, 1000., 0.);
            let sink = tree.add_sink(1, 2000., 0., 0.05, 0.);
            tree.connect(RcTree::ROOT, cand);
            tree.connect(cand, sink);
            tree
        };
        let ids = NodeIdAllocator::new(6);
        let mut plain = VanGinneken::new(&buffers);
        let mut tree = build();
        assert_eq!(segment_and_optimize(&mut plain, &mut tree, &drivers, 0, &ids), 0);
        let mut seg = VanGinneken::new(&buffers);
        let mut tree = build();
        assert_eq!(segment_and_optimize(&mut seg, &mut tree, &drivers, 4, &ids), 8);
        assert!(seg.best().unwrap().time >= plain.best().unwrap().time - 1e-9);
    }

    type Point = (f64, f64, f64);

    fn frontier(van: &mut VanGinneken, points: &[Point]) -> AscendingParetoList {
        let mut list = AscendingParetoList::new();
        for &(time, capacitance, area) in points {
            list.insert(CandidateSolution {
                time, capacitance, area, inverted: false, decision: None
            }, &mut van.arena);
        }
        list
    }

    fn points(list: &AscendingParetoList) -> Vec<Point> {
        let mut v = list.iter()
            .map(|s| (s.time, s.capacitance, s.area))
            .collect::<Vec<_>>();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn merge_tie_advances_incoming_branch() {
        let mut van = VanGinneken::new(&[]);
        let held = frontier(&mut van, &[(5., 1., 0.)]);
        let incoming = frontier(&mut van, &[(5., 1., 5.), (9., 3., 0.)]);
        let merged = van.merge(held, incoming);
        assert_eq!(points(&merged), vec![(5., 2., 5.), (5., 4., 0.)]);
        // one merge decision per merged solution.
        assert_eq!(van.arena().live_count(), 2);
        for s in merged.iter() {
            let d = s.decision.unwrap();
            assert_eq!(van.arena().kind(d), DecisionKind::Merge);
            assert_eq!(van.arena().children(d), (None, None));
        }
    }

    /// lock-step sweep over two time-sorted frontiers, then the weak
    /// Pareto filter of everything it produced.
    fn reference_merge(l: &[Point], r: &[Point]) -> Vec<Point> {
        let (mut i, mut j) = (0, 0);
        let mut raw = Vec::new();
        while i < l.len() && j < r.len() {
            let (x, y) = (l[i], r[j]);
            raw.push((x.0.min(y.0), x.1 + y.1, x.2 + y.2));
            if x.0 < y.0 {
                i += 1;
            }
            else {
                j += 1;
            }
        }
        raw.sort_by(|a, b| a.partial_cmp(b).unwrap());
        raw.dedup();
        raw.iter().copied().filter(|&p| !raw.iter().any(|&q| {
            q != p && q.0 >= p.0 && q.1 <= p.1 && q.2 <= p.2
        })).collect()
    }

    #[test]
    fn merge_matches_lock_step_sweep() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha20Rng;
        let mut rng = ChaCha20Rng::seed_from_u64(8026728);
        for _ in 0..500 {
            let mut van = VanGinneken::new(&[]);
            // a coarse grid makes equal times frequent.
            let mut random = |n: usize| (0..n).map(|_| (
                rng.gen_range(0..8) as f64,
                rng.gen_range(1..5) as f64,
                rng.gen_range(0..4) as f64,
            )).collect::<Vec<_>>();
            let (a, b) = (random(6), random(6));
            let held = frontier(&mut van, &a);
            let incoming = frontier(&mut van, &b);
            let l = held.iter().map(|s| (s.time, s.capacitance, s.area)).collect::<Vec<_>>();
            let r = incoming.iter().map(|s| (s.time, s.capacitance, s.area)).collect::<Vec<_>>();
            let merged = van.merge(held, incoming);
            assert_eq!(points(&merged), reference_merge(&l, &r));
            assert_eq!(van.arena().live_count(), merged.len());
        }
    }
}
