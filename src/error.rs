// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for library/topology construction.
//!
//! The DP engine itself never fails. Everything here is raised while
//! building the inputs, and is recovered by skipping the affected net.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum OptError {
    /// A library or topology file cannot be opened.
    InputNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A record in an input file cannot be parsed.
    Malformed {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    /// A pin/instance path cannot be resolved in the netlist.
    LookupMiss { path: String },
    /// An edge references a node id that was never declared.
    UnknownNode { id: u64 },
    /// A net has nothing to optimize (no resolvable sink).
    EmptyNet { net: String },
    /// The worker pool cannot be created.
    ThreadPool(rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, OptError>;

impl fmt::Display for OptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptError::InputNotFound { path, source } =>
                write!(f, "cannot open file: {} ({})", path.display(), source),
            OptError::Malformed { path, line, msg } =>
                write!(f, "{}:{}: {}", path.display(), line, msg),
            OptError::LookupMiss { path } =>
                write!(f, "cannot resolve pin path {}", path),
            OptError::UnknownNode { id } =>
                write!(f, "edge references undeclared node {}", id),
            OptError::EmptyNet { net } =>
                write!(f, "net {} has no sink to optimize", net),
            OptError::ThreadPool(e) =>
                write!(f, "cannot build worker pool: {}", e),
        }
    }
}

impl std::error::Error for OptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OptError::InputNotFound { source, .. } => Some(source),
            OptError::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for OptError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        OptError::ThreadPool(e)
    }
}
