// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Net topology text files.
//!
//! The file is a whitespace-separated token stream. Every record starts
//! with a free-form tag token:
//!
//! ```text
//! r0 <unit resistance>
//! c0 <unit capacitance, fF>
//! source <x> <y>
//! drivers <n>    then n times: <name> <cap fF> <delay> <res> [area]
//! sinks <n>      then n times: <tag> <id> <x> <y> <cap fF> <required time>
//! candidates <n> then n times: <tag> <id> <x> <y>
//! then until the end: <tag> <parent id> <child id>
//! ```
//!
//! The source always has id 0.

use itertools::Itertools;
use std::collections::HashMap;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::error::{OptError, Result};
use crate::library::{BufferCell, CAPACITANCE_SCALE};
use crate::rctree::{NodeIdAllocator, RcTree};
use crate::topology::{NetSource, NetTopology};

/// Tokens tagged with their 1-based line numbers.
struct Tokens<'t, I: Iterator<Item = (usize, &'t str)>> {
    inner: Peekable<I>,
    path: &'t Path,
    last_line: usize,
}

impl<'t, I: Iterator<Item = (usize, &'t str)>> Tokens<'t, I> {
    fn malformed(&self, line: usize, msg: String) -> OptError {
        OptError::Malformed { path: self.path.to_path_buf(), line, msg }
    }

    fn word(&mut self, what: &str) -> Result<&'t str> {
        match self.inner.next() {
            Some((line, tok)) => {
                self.last_line = line;
                Ok(tok)
            }
            None => Err(self.malformed(
                self.last_line, format!("unexpected end of file, expecting {}", what)))
        }
    }

    fn num<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let tok = self.word(what)?;
        tok.parse::<T>().map_err(|_| self.malformed(
            self.last_line, format!("expecting {}, got `{}`", what, tok)))
    }

    fn declare(
        &self, index: &mut HashMap<u64, usize>, id: u64, node: usize
    ) -> Result<()> {
        match index.insert(id, node) {
            Some(_) => Err(self.malformed(
                self.last_line, format!("node id {} declared twice", id))),
            None => Ok(())
        }
    }

    /// consume the next token if it is a number.
    fn optional_num(&mut self) -> Option<f64> {
        let (line, tok) = *self.inner.peek()?;
        let v = tok.parse::<f64>().ok()?;
        self.inner.next();
        self.last_line = line;
        Some(v)
    }
}

/// Parse a net file already read into memory.
///
/// Returns the tree and the driver cells in file order.
pub fn parse_net_file(
    text: &str, path: &Path
) -> Result<(RcTree, Vec<BufferCell>)> {
    let mut toks = Tokens {
        inner: text.lines().enumerate()
            .flat_map(|(i, l)| l.split_whitespace().map(move |t| (i + 1, t)))
            .peekable(),
        path,
        last_line: 1,
    };

    toks.word("r0 tag")?;
    let r0 = toks.num::<f64>("unit resistance")?;
    toks.word("c0 tag")?;
    let c0 = toks.num::<f64>("unit capacitance")? / CAPACITANCE_SCALE;
    toks.word("source tag")?;
    let x = toks.num("source x")?;
    let y = toks.num("source y")?;
    let mut tree = RcTree::new(0, x, y, r0, c0);
    let mut index = HashMap::from([(0u64, RcTree::ROOT)]);

    toks.word("driver count tag")?;
    let num_drivers = toks.num::<usize>("driver count")?;
    let mut drivers = Vec::with_capacity(num_drivers);
    for _ in 0..num_drivers {
        let name = toks.word("driver name")?;
        let c = toks.num::<f64>("driver capacitance")?;
        let d = toks.num("driver delay")?;
        let r = toks.num("driver resistance")?;
        let area = toks.optional_num().unwrap_or(0.);
        drivers.push(BufferCell::new(name, c / CAPACITANCE_SCALE, d, r, area));
    }

    toks.word("sink count tag")?;
    let num_sinks = toks.num::<usize>("sink count")?;
    for _ in 0..num_sinks {
        toks.word("sink tag")?;
        let id = toks.num::<u64>("sink id")?;
        let x = toks.num("sink x")?;
        let y = toks.num("sink y")?;
        let cap = toks.num::<f64>("sink capacitance")? / CAPACITANCE_SCALE;
        let rat = toks.num("sink required time")?;
        let node = tree.add_sink(id, x, y, cap, rat);
        toks.declare(&mut index, id, node)?;
    }

    toks.word("candidate count tag")?;
    let num_candidates = toks.num::<usize>("candidate count")?;
    for _ in 0..num_candidates {
        toks.word("candidate tag")?;
        let id = toks.num::<u64>("candidate id")?;
        let x = toks.num("candidate x")?;
        let y = toks.num("candidate y")?;
        let node = tree.add_candidate(id, x, y);
        toks.declare(&mut index, id, node)?;
    }

    let last_line = toks.last_line;
    let rest = toks.inner.map(|(_, t)| t).collect::<Vec<_>>();
    if rest.len() % 3 != 0 {
        return Err(OptError::Malformed {
            path: path.to_path_buf(), line: last_line,
            msg: format!("{} trailing tokens after the last edge", rest.len() % 3)
        })
    }
    for (_tag, from, to) in rest.into_iter().tuples() {
        let lookup = |s: &str| -> Result<usize> {
            let id = s.parse::<u64>().map_err(|_| OptError::Malformed {
                path: path.to_path_buf(), line: last_line,
                msg: format!("expecting node id in edge, got `{}`", s)
            })?;
            index.get(&id).copied().ok_or(OptError::UnknownNode { id })
        };
        let (parent, child) = (lookup(from)?, lookup(to)?);
        if tree.nodes[child].parent.is_some() || child == RcTree::ROOT {
            return Err(OptError::Malformed {
                path: path.to_path_buf(), line: last_line,
                msg: format!("node {} has more than one parent", to)
            })
        }
        tree.connect(parent, child);
    }

    Ok((tree, drivers))
}

/// Read a net file.
pub fn read_net_file(path: &Path) -> Result<(RcTree, Vec<BufferCell>)> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        OptError::InputNotFound { path: path.to_path_buf(), source }
    })?;
    let (tree, drivers) = parse_net_file(&text, path)?;
    clilog::debug!("read net {}: {} nodes, {} drivers",
                   path.display(), tree.len(), drivers.len());
    Ok((tree, drivers))
}

/// A set of independent net files forming a single level.
pub struct NetFileSource {
    nets: Vec<NetTopology>,
    first_free: u64,
}

impl NetFileSource {
    /// read every file up front.
    pub fn open(paths: &[PathBuf]) -> Result<NetFileSource> {
        let mut nets = Vec::with_capacity(paths.len());
        let mut first_free = 1;
        for path in paths {
            let (tree, drivers) = read_net_file(path)?;
            first_free = first_free.max(tree.max_id() + 1);
            let name = path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            nets.push(NetTopology {
                name, tree, drivers,
                driver_instance: None,
                sink_instances: Vec::new(),
            });
        }
        Ok(NetFileSource { nets, first_free })
    }
}

impl NetSource for NetFileSource {
    fn num_levels(&self) -> usize {
        1
    }

    fn level_nets(&self, level: usize) -> Vec<usize> {
        match level {
            0 => (0..self.nets.len()).collect(),
            _ => vec![]
        }
    }

    fn net_name(&self, net: usize) -> String {
        self.nets[net].name.clone()
    }

    fn load_net(&self, net: usize, _ids: &NodeIdAllocator) -> Result<NetTopology> {
        Ok(self.nets[net].clone())
    }

    fn instance_delay(&self, _inst: usize) -> f64 {
        0.
    }

    fn first_free_node_id(&self) -> u64 {
        self.first_free
    }
}
