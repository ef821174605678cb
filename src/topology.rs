// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! The interface between topology readers and the optimizer.

use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::library::BufferCell;
use crate::rctree::{NodeIdAllocator, RcTree};

/// Tunables of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// upper bound of candidate nodes inserted on one wire.
    /// 0 disables segmentation.
    pub max_segments_per_wire: usize,
    /// final solutions presenting this capacitance or more are
    /// not returned.
    pub pin_capacitance_limit: f64,
    /// frontier size bound per node and polarity.
    pub max_solutions_per_node: usize,
    /// required time of sinks without a downstream constraint.
    pub default_required_time: f64,
    /// load of sinks whose cell is not in the library, in pF.
    pub default_sink_capacitance: f64,
    /// worker threads. 0 lets rayon decide.
    pub num_threads: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            max_segments_per_wire: 0,
            pin_capacitance_limit: f64::MAX,
            max_solutions_per_node: 4096,
            default_required_time: 0.,
            default_sink_capacitance: 0.001,
            num_threads: 0,
        }
    }
}

/// One net, ready to be optimized.
#[derive(Debug, Clone)]
pub struct NetTopology {
    pub name: String,
    pub tree: RcTree,
    pub drivers: Vec<BufferCell>,
    /// the instance whose output drives this net, if any.
    pub driver_instance: Option<usize>,
    /// (tree node index, instance) for every sink that is an instance
    /// input pin.
    pub sink_instances: Vec<(usize, usize)>,
}

/// A provider of net topologies, organized in dependency levels.
///
/// Levels are listed from the sinks toward the sources: nets of level
/// `i` only depend on instances driving nets of levels `< i`.
pub trait NetSource: Sync {
    fn num_levels(&self) -> usize;

    /// the nets (as opaque indices) of one level.
    fn level_nets(&self, level: usize) -> Vec<usize>;

    fn net_name(&self, net: usize) -> String;

    /// build the RC tree of a net. new node ids come from `ids`.
    fn load_net(&self, net: usize, ids: &NodeIdAllocator) -> Result<NetTopology>;

    /// the propagation delay of an instance.
    fn instance_delay(&self, inst: usize) -> f64;

    /// the smallest node id no loaded tree will ever use.
    fn first_free_node_id(&self) -> u64;
}
