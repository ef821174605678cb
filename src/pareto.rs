// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Pareto-pruned solution lists.
//!
//! A solution A dominates B when A has no smaller time, no larger
//! capacitance and no larger area. Lists only ever hold mutually
//! non-dominated entries; of two identical entries the one inserted
//! first is kept.
//!
//! Per-node lists are ordered by increasing time, the final per-net
//! list by decreasing time. The two orders are separate types so one
//! comparator can never be used in place of the other.
//!
//! Each entry owns one reference to its decision. Lists release the
//! reference of every entry they reject or remove.

use crate::decision::{DecisionArena, DecisionId};

/// A frontier entry at one tree node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateSolution {
    /// required arrival time. larger is better.
    pub time: f64,
    /// capacitance seen looking downstream.
    pub capacitance: f64,
    /// buffer area spent downstream.
    pub area: f64,
    /// whether the signal here is inverted w.r.t. the sinks.
    pub inverted: bool,
    pub decision: Option<DecisionId>,
}

/// A whole-net result with its driver chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalSolution {
    pub time: f64,
    /// capacitance the driver has to drive.
    pub capacitance: f64,
    /// total area including the driver.
    pub area: f64,
    /// index of the driver cell.
    pub driver: usize,
    pub decision: Option<DecisionId>,
}

#[inline]
fn covers(
    by_capacitance: bool,
    (c1, a1): (f64, f64), (c2, a2): (f64, f64)
) -> bool {
    (!by_capacitance || c1 <= c2) && a1 <= a2
}

/// ascending insertion shared by the general and the time/area list.
///
/// returns whether the solution was kept.
fn insert_ascending(
    list: &mut Vec<CandidateSolution>,
    sol: CandidateSolution,
    by_capacitance: bool,
    arena: &mut DecisionArena,
) -> bool {
    let key = |s: &CandidateSolution| (s.capacitance, s.area);
    let pos = list.partition_point(|e| e.time < sol.time);
    if list[pos..].iter().any(|e| covers(by_capacitance, key(e), key(&sol))) {
        arena.release(sol.decision);
        return false
    }
    // only entries before `end` can be dominated by sol.
    let end = list.partition_point(|e| e.time <= sol.time);
    let mut kept = 0;
    let mut insert_at = end;
    for i in 0..list.len() {
        let e = list[i];
        if i < end && covers(by_capacitance, key(&sol), key(&e)) {
            arena.release(e.decision);
            insert_at -= 1;
            continue
        }
        list[kept] = e;
        kept += 1;
    }
    list.truncate(kept);
    list.insert(insert_at, sol);
    true
}

/// Solutions at a tree node, sorted by increasing time.
#[derive(Debug, Clone, Default)]
pub struct AscendingParetoList {
    list: Vec<CandidateSolution>,
}

impl AscendingParetoList {
    pub fn new() -> AscendingParetoList {
        Default::default()
    }

    /// insert with full (time, capacitance, area) dominance pruning.
    ///
    /// takes over the solution's decision reference.
    pub fn insert(
        &mut self, sol: CandidateSolution, arena: &mut DecisionArena
    ) -> bool {
        insert_ascending(&mut self.list, sol, true, arena)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateSolution> {
        self.list.iter()
    }

    pub fn as_slice(&self) -> &[CandidateSolution] {
        &self.list
    }

    /// move all solutions out, leaving the list empty.
    /// the references go along with them.
    pub fn take(&mut self) -> Vec<CandidateSolution> {
        std::mem::take(&mut self.list)
    }

    /// drop every solution, releasing their decisions.
    pub fn clear(&mut self, arena: &mut DecisionArena) {
        for sol in self.list.drain(..) {
            arena.release(sol.decision);
        }
    }

    /// keep at most `max` solutions, dropping the smallest times first.
    pub fn enforce_limit(&mut self, max: usize, arena: &mut DecisionArena) {
        if self.list.len() <= max {
            return
        }
        let excess = self.list.len() - max;
        for sol in self.list.drain(..excess) {
            arena.release(sol.decision);
        }
    }
}

/// Staging list for buffered solutions of one buffer type.
///
/// All entries present the same input capacitance, so only time and
/// area take part in dominance.
#[derive(Debug, Clone, Default)]
pub struct AscendingTimeAreaList {
    list: Vec<CandidateSolution>,
}

impl AscendingTimeAreaList {
    pub fn new() -> AscendingTimeAreaList {
        Default::default()
    }

    pub fn insert(
        &mut self, sol: CandidateSolution, arena: &mut DecisionArena
    ) -> bool {
        insert_ascending(&mut self.list, sol, false, arena)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// flush the staged solutions into a general list.
    pub fn drain_into(
        &mut self, target: &mut AscendingParetoList, arena: &mut DecisionArena
    ) {
        for sol in self.list.drain(..) {
            target.insert(sol, arena);
        }
    }
}

/// Final solutions of a net, sorted by decreasing time.
#[derive(Debug, Clone, Default)]
pub struct DescendingParetoList {
    list: Vec<FinalSolution>,
}

impl DescendingParetoList {
    pub fn new() -> DescendingParetoList {
        Default::default()
    }

    /// insert with (time, capacitance, area) dominance pruning.
    pub fn insert(
        &mut self, sol: FinalSolution, arena: &mut DecisionArena
    ) -> bool {
        let pos = self.list.partition_point(|e| e.time >= sol.time);
        if self.list[..pos].iter().any(|e| {
            e.capacitance <= sol.capacitance && e.area <= sol.area
        }) {
            arena.release(sol.decision);
            return false
        }
        let start = self.list.partition_point(|e| e.time > sol.time);
        let mut kept = start;
        for i in start..self.list.len() {
            let e = self.list[i];
            if sol.capacitance <= e.capacitance && sol.area <= e.area {
                arena.release(e.decision);
                continue
            }
            self.list[kept] = e;
            kept += 1;
        }
        self.list.truncate(kept);
        // entries with time == sol.time that survived stay ahead.
        let at = self.list.partition_point(|e| e.time >= sol.time);
        self.list.insert(at, sol);
        true
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FinalSolution> {
        self.list.iter()
    }

    pub fn clear(&mut self, arena: &mut DecisionArena) {
        for sol in self.list.drain(..) {
            arena.release(sol.decision);
        }
    }
}
