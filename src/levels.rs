// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Multi-net scheduling over dependency levels.
//!
//! Levels run one after another. The nets of a level are optimized in
//! parallel on a rayon pool; each task owns its tree and optimizer and
//! hands back a result. Between levels the coordinator folds the
//! results into a per-instance table of best times, which the next
//! level uses to tighten the required time of sinks on those
//! instances' inputs.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::decision::{buffer_insertions, BufferInsertion, DecisionGraph};
use crate::error::Result;
use crate::library::BufferCell;
use crate::rctree::NodeIdAllocator;
use crate::topology::{NetSource, NetTopology, OptimizerConfig};
use crate::van::{segment_and_optimize, VanGinneken};

/// A final solution detached from its optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSolution {
    pub time: f64,
    pub capacitance: f64,
    pub area: f64,
    pub driver: usize,
    /// root of this solution's decisions in [`NetResult::decisions`].
    pub root: Option<u32>,
}

/// The solutions kept for one net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetResult {
    pub net: String,
    pub level: usize,
    /// by decreasing time.
    pub solutions: Vec<PersistedSolution>,
    pub decisions: DecisionGraph,
}

impl NetResult {
    /// copy the returned solutions of an optimizer, all or only the
    /// best one.
    pub fn collect(
        van: &VanGinneken, net: String, level: usize, keep_all: bool
    ) -> NetResult {
        let mut sols = van.solutions();
        if !keep_all {
            sols.truncate(1);
        }
        let mut decisions = DecisionGraph::default();
        let mut memo = HashMap::new();
        let solutions = sols.iter().map(|s| PersistedSolution {
            time: s.time,
            capacitance: s.capacitance,
            area: s.area,
            driver: s.driver,
            root: decisions.import(van.arena(), s.decision, &mut memo),
        }).collect();
        NetResult { net, level, solutions, decisions }
    }

    pub fn best(&self) -> Option<&PersistedSolution> {
        self.solutions.first()
    }

    pub fn buffer_insertions(&self, sol: &PersistedSolution) -> Vec<BufferInsertion> {
        buffer_insertions(&self.decisions, sol.root)
    }
}

/// What became of one net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetOutcome {
    Solved(NetResult),
    /// the net could not be built. the run went on without it.
    Skipped { net: String, level: usize, reason: String },
}

impl NetOutcome {
    pub fn net(&self) -> &str {
        match self {
            NetOutcome::Solved(r) => &r.net,
            NetOutcome::Skipped { net, .. } => net,
        }
    }
}

/// Runs the single-net optimizer over every level of a [`NetSource`].
pub struct LevelScheduler<'a, S: NetSource> {
    source: &'a S,
    buffers: &'a [BufferCell],
    config: OptimizerConfig,
    pool: rayon::ThreadPool,
    ids: NodeIdAllocator,
    /// best time seen at any output of an instance, by instance.
    best_by_instance: HashMap<usize, f64>,
}

impl<'a, S: NetSource> LevelScheduler<'a, S> {
    pub fn new(
        source: &'a S, buffers: &'a [BufferCell], config: OptimizerConfig
    ) -> Result<LevelScheduler<'a, S>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()?;
        clilog::info!("level scheduler: {} levels, {} threads",
                      source.num_levels(), pool.current_num_threads());
        Ok(LevelScheduler {
            source, buffers, config, pool,
            ids: NodeIdAllocator::new(source.first_free_node_id()),
            best_by_instance: HashMap::new(),
        })
    }

    /// the best time known for an instance's outputs.
    pub fn instance_best(&self, inst: usize) -> Option<f64> {
        self.best_by_instance.get(&inst).copied()
    }

    /// Optimize every level. Returns one outcome per net and level.
    pub fn run(&mut self) -> Vec<NetOutcome> {
        let num_levels = self.source.num_levels();
        let mut outcomes = Vec::new();
        for level in 0..num_levels {
            let timer = clilog::stimer!("optimize level");
            let nets = self.source.level_nets(level);
            let keep_all = level + 1 == num_levels;
            let this = &*self;
            let results = self.pool.install(|| {
                nets.par_iter()
                    .map(|&net| this.solve_net(net, level, keep_all))
                    .collect::<Vec<_>>()
            });
            // every task of the level is done. commit.
            let mut num_skipped = 0;
            for (outcome, driven) in results {
                if let Some((inst, time)) = driven {
                    let best = self.best_by_instance.entry(inst).or_insert(time);
                    *best = best.min(time);
                }
                if matches!(outcome, NetOutcome::Skipped { .. }) {
                    num_skipped += 1;
                }
                outcomes.push(outcome);
            }
            clilog::info!("level {}: {} nets, {} skipped",
                          level, nets.len(), num_skipped);
            clilog::finish!(timer);
        }
        outcomes
    }

    /// tighten sink required times with the results of earlier levels.
    fn pre_run(&self, topo: &mut NetTopology) {
        for &(node, inst) in &topo.sink_instances {
            let best = match self.best_by_instance.get(&inst) {
                Some(&b) => b,
                None => continue
            };
            let delay = self.source.instance_delay(inst);
            if let Some(sink) = &mut topo.tree.nodes[node].sink {
                sink.required_time = sink.required_time.min(best - delay);
            }
        }
    }

    /// one task: build, tighten, segment and solve a net.
    ///
    /// also returns the driving instance with the best time found.
    fn solve_net(
        &self, net: usize, level: usize, keep_all: bool
    ) -> (NetOutcome, Option<(usize, f64)>) {
        let mut topo = match self.source.load_net(net, &self.ids) {
            Ok(topo) => topo,
            Err(e) => {
                let name = self.source.net_name(net);
                clilog::warn!(OPT_NET_SKIPPED, "net {} skipped: {}", name, e);
                return (NetOutcome::Skipped {
                    net: name, level, reason: e.to_string()
                }, None)
            }
        };
        self.ids.reserve_through(topo.tree.max_id());
        self.pre_run(&mut topo);

        let mut van = VanGinneken::with_config(self.buffers, &self.config);
        segment_and_optimize(
            &mut van, &mut topo.tree, &topo.drivers,
            self.config.max_segments_per_wire, &self.ids);
        let result = NetResult::collect(&van, topo.name, level, keep_all);
        let driven = topo.driver_instance
            .zip(result.best().map(|s| s.time));
        (NetOutcome::Solved(result), driven)
    }
}
