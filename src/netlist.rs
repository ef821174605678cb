// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Net topologies from a gate-level netlist and a level file.
//!
//! The level file is a token stream. `level <n>` starts a new level;
//! every other token is a pin path `inst/.../pin` whose net joins the
//! current level. Within a path, a `\` before a `/` makes the slash part
//! of an instance name.
//!
//! Placement is not available, so node coordinates are synthesized from
//! hashes of the net and pin ids. They only give the trees a stable,
//! nonzero wire length.

use compact_str::CompactString;
use indexmap::{IndexMap, IndexSet};
use netlistdb::{GeneralHierName, GeneralPinName, NetlistDB};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use crate::error::{OptError, Result};
use crate::library::{find_cell, BufferCell};
use crate::rctree::{NodeIdAllocator, RcTree};
use crate::topology::{NetSource, NetTopology, OptimizerConfig};

/// Wire unit resistance of synthesized trees.
pub const DEFAULT_UNIT_RESISTANCE: f64 = 0.02;
/// Wire unit capacitance of synthesized trees, in pF.
pub const DEFAULT_UNIT_CAPACITANCE: f64 = 0.2;
/// Coordinates are taken modulo this.
pub const COORDINATE_RANGE: u64 = 5000;

/// The driver cell assumed for every net.
pub fn default_driver() -> BufferCell {
    BufferCell::new("default_driver", 1., 10., 200., 0.)
}

fn hashed_coordinate<T: Hash>(v: T) -> f64 {
    let mut h = DefaultHasher::new();
    v.hash(&mut h);
    (h.finish() % COORDINATE_RANGE) as f64
}

/// Split a pin path into its instance name and pin name.
///
/// Hierarchy separators in the instance part become `.`, the way
/// netlistdb prints hierarchical names, and escaped slashes become
/// plain ones. Returns `None` for paths without an instance part,
/// i.e. top-level ports.
pub fn split_pin_path(path: &str) -> Option<(String, &str)> {
    let bytes = path.as_bytes();
    let slash = (1..bytes.len()).rev()
        .find(|&i| bytes[i] == b'/' && bytes[i - 1] != b'\\')?;
    let mut inst = String::with_capacity(slash);
    let mut escaped = false;
    for ch in path[..slash].chars() {
        match (ch, escaped) {
            ('\\', false) => escaped = true,
            ('/', false) => inst.push('.'),
            (ch, _) => {
                inst.push(ch);
                escaped = false;
            }
        }
    }
    Some((inst, &path[slash + 1..]))
}

/// strip verilog escaped-identifier decoration.
fn plain_instance_name(name: &str) -> &str {
    let name = name.strip_prefix('\\').unwrap_or(name);
    name.strip_suffix(' ').unwrap_or(name)
}

/// One net of one level, with the pins listed for it.
#[derive(Debug, Clone)]
struct LevelNet {
    net: usize,
    pins: IndexSet<usize>,
}

/// Nets of a netlist, grouped into levels.
///
/// Everything needed from the database is copied out on construction,
/// so this can be shared between workers.
pub struct NetlistNets {
    net_names: Vec<String>,
    /// pins of every net, the driver first.
    net_pins: Vec<Vec<usize>>,
    pin_cell: Vec<usize>,
    pin_net: Vec<usize>,
    cell_types: Vec<CompactString>,
    constant_nets: [Option<usize>; 2],
    pin_lookup: HashMap<(String, CompactString), usize>,
    entries: Vec<LevelNet>,
    levels: Vec<Vec<usize>>,
    library: Vec<BufferCell>,
    drivers: Vec<BufferCell>,
    default_sink_capacitance: f64,
    default_required_time: f64,
}

impl NetlistNets {
    pub fn from_netlistdb(
        netlistdb: &NetlistDB,
        library: &[BufferCell],
        config: &OptimizerConfig,
    ) -> NetlistNets {
        let net_names = (0..netlistdb.num_nets)
            .map(|i| format!("{}", netlistdb.netnames[i].dbg_fmt_pin()))
            .collect();
        let net_pins = (0..netlistdb.num_nets)
            .map(|i| netlistdb.net2pin.iter_set(i).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let mut pin_lookup = HashMap::new();
        // cell 0 is the top module. its pins are ports.
        for cellid in 1..netlistdb.num_cells {
            let cellname = format!("{}", netlistdb.cellnames[cellid].dbg_fmt_hier());
            let cellname = plain_instance_name(&cellname).to_string();
            for pinid in netlistdb.cell2pin.iter_set(cellid) {
                let (_, pin, idx) = &netlistdb.pinnames[pinid];
                let pin = match idx {
                    Some(i) => CompactString::from(format!("{}[{}]", pin, i)),
                    None => pin.clone()
                };
                pin_lookup.insert((cellname.clone(), pin), pinid);
            }
        }
        let ret = NetlistNets {
            net_names, net_pins,
            pin_cell: netlistdb.pin2cell.clone(),
            pin_net: netlistdb.pin2net.clone(),
            cell_types: netlistdb.celltypes.clone(),
            constant_nets: [netlistdb.net_zero, netlistdb.net_one],
            pin_lookup,
            entries: Vec::new(),
            levels: Vec::new(),
            library: library.to_vec(),
            drivers: vec![default_driver()],
            default_sink_capacitance: config.default_sink_capacitance,
            default_required_time: config.default_required_time,
        };
        clilog::info!("netlist has {} nets, {} pins",
                      ret.net_pins.len(), ret.pin_cell.len());
        ret
    }

    /// Read a level file, replacing any previous levels.
    pub fn read_levels(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            OptError::InputNotFound { path: path.to_path_buf(), source }
        })?;
        self.parse_levels(&text, path)
    }

    /// Parse level file content.
    ///
    /// Unresolved pin paths are reported and skipped.
    pub fn parse_levels(&mut self, text: &str, path: &Path) -> Result<()> {
        self.entries.clear();
        self.levels.clear();
        let mut current = IndexMap::<usize, IndexSet<usize>>::new();
        let mut num_misses = 0;
        let mut toks = text.lines().enumerate()
            .flat_map(|(i, l)| l.split_whitespace().map(move |t| (i + 1, t)));
        while let Some((line, tok)) = toks.next() {
            if tok == "level" {
                let n = toks.next().map(|(_, n)| n);
                if n.and_then(|n| n.parse::<u64>().ok()).is_none() {
                    return Err(OptError::Malformed {
                        path: path.to_path_buf(), line,
                        msg: format!("expecting level number, got {:?}", n)
                    })
                }
                self.close_level(&mut current);
                continue
            }
            match self.resolve_pin(tok) {
                Ok(pin) => {
                    let net = self.net_of_pin(pin);
                    match net {
                        Some(net) => {
                            current.entry(net).or_default().insert(pin);
                        }
                        None => clilog::debug!("pin {} is on a constant net", tok)
                    }
                }
                Err(e) => {
                    num_misses += 1;
                    clilog::warn!(OPT_LOOKUP_MISS, "{}, skipped", e);
                }
            }
        }
        self.close_level(&mut current);
        clilog::info!("read {} levels with {} nets ({} unresolved pins)",
                      self.levels.len(), self.entries.len(), num_misses);
        Ok(())
    }

    fn close_level(&mut self, current: &mut IndexMap<usize, IndexSet<usize>>) {
        if current.is_empty() {
            return
        }
        let mut level = Vec::with_capacity(current.len());
        for (net, pins) in current.drain(..) {
            level.push(self.entries.len());
            self.entries.push(LevelNet { net, pins });
        }
        self.levels.push(level);
    }

    fn resolve_pin(&self, path: &str) -> Result<usize> {
        let miss = || OptError::LookupMiss { path: path.to_string() };
        let (inst, pin) = split_pin_path(path).ok_or_else(miss)?;
        self.pin_lookup.get(&(inst, CompactString::new(pin)))
            .copied()
            .ok_or_else(miss)
    }

    /// the net of a pin, unless it is tied to a constant.
    fn net_of_pin(&self, pin: usize) -> Option<usize> {
        let net = self.pin_net[pin];
        match net < self.net_pins.len() && !self.constant_nets.contains(&Some(net)) {
            true => Some(net),
            false => None
        }
    }

    fn library_cell(&self, inst: usize) -> Option<&BufferCell> {
        find_cell(&self.library, self.cell_types[inst].as_str())
    }
}

impl NetSource for NetlistNets {
    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn level_nets(&self, level: usize) -> Vec<usize> {
        self.levels.get(level).cloned().unwrap_or_default()
    }

    fn net_name(&self, entry: usize) -> String {
        self.net_names[self.entries[entry].net].clone()
    }

    fn load_net(&self, entry: usize, _ids: &NodeIdAllocator) -> Result<NetTopology> {
        let LevelNet { net, pins } = &self.entries[entry];
        let root = self.net_pins[*net][0];
        let x = hashed_coordinate(("net", *net));
        let mut tree = RcTree::new(
            root as u64, x, hashed_coordinate(("pin", root)),
            DEFAULT_UNIT_RESISTANCE, DEFAULT_UNIT_CAPACITANCE);
        let mut sink_instances = Vec::new();
        for &pin in pins.iter().filter(|&&p| p != root) {
            let inst = self.pin_cell[pin];
            let cap = match inst {
                0 => self.default_sink_capacitance,
                _ => self.library_cell(inst)
                    .map(|c| c.capacitance)
                    .unwrap_or(self.default_sink_capacitance)
            };
            let node = tree.add_sink(
                pin as u64, x, hashed_coordinate(("pin", pin)),
                cap, self.default_required_time);
            tree.connect(RcTree::ROOT, node);
            if inst != 0 {
                sink_instances.push((node, inst));
            }
        }
        if tree.len() < 2 {
            return Err(OptError::EmptyNet { net: self.net_name(entry) })
        }
        let driver_instance = match self.pin_cell[root] {
            0 => None,
            inst => Some(inst)
        };
        Ok(NetTopology {
            name: self.net_name(entry),
            tree,
            drivers: self.drivers.clone(),
            driver_instance,
            sink_instances,
        })
    }

    fn instance_delay(&self, inst: usize) -> f64 {
        self.library_cell(inst).map(|c| c.delay).unwrap_or(0.)
    }

    fn first_free_node_id(&self) -> u64 {
        self.pin_cell.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("u1/A", Some(("u1", "A")))]
    #[test_case("core/alu/u7/ZN", Some(("core.alu.u7", "ZN")))]
    #[test_case("bank\\/0/Q", Some(("bank/0", "Q")))]
    #[test_case("a/b\\/c\\/d/Y", Some(("a.b/c/d", "Y")))]
    #[test_case("clk", None)]
    fn pin_paths(path: &str, expect: Option<(&str, &str)>) {
        let got = split_pin_path(path);
        assert_eq!(got.as_ref().map(|(i, p)| (i.as_str(), *p)), expect);
    }

    #[test]
    fn escaped_names_are_plain() {
        assert_eq!(plain_instance_name("\\bank[0] "), "bank[0]");
        assert_eq!(plain_instance_name("u1"), "u1");
    }

    #[test]
    fn coordinates_are_stable_and_bounded() {
        let a = hashed_coordinate(("pin", 42usize));
        assert_eq!(a, hashed_coordinate(("pin", 42usize)));
        assert!((0. ..COORDINATE_RANGE as f64).contains(&a));
    }
}
