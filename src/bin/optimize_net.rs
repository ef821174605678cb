// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Buffer a single net described by a net file.

use anyhow::Context;
use std::path::PathBuf;
use vanbuf::error::OptError;
use vanbuf::levels::NetResult;
use vanbuf::library::read_buffer_library;
use vanbuf::netfile::read_net_file;
use vanbuf::rctree::NodeIdAllocator;
use vanbuf::report::{log_peak_memory, write_report};
use vanbuf::topology::OptimizerConfig;
use vanbuf::van::{segment_and_optimize, VanGinneken};

#[derive(clap::Parser, Debug)]
struct OptimizeNetArgs {
    /// Net topology file.
    #[clap(short = 'n', long)]
    net: PathBuf,
    /// Buffer library, one `name cap delay res [area]` record per line.
    #[clap(short = 'b', long)]
    buffers: PathBuf,
    /// Report output path. Printed to stdout if not given.
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,
    /// Also list all non-dominated solutions.
    #[clap(short = 'a', long)]
    all: bool,
    /// Maximum candidate nodes inserted on one wire.
    ///
    /// By default is 0, meaning wires are not segmented.
    #[clap(long, default_value_t = 0)]
    max_segments: usize,
    /// Drop solutions whose driver load reaches this capacitance (pF).
    #[clap(long)]
    cap_limit: Option<f64>,
}

fn run(args: &OptimizeNetArgs) -> anyhow::Result<()> {
    let buffers = match read_buffer_library(&args.buffers) {
        Ok(b) => b,
        Err(e @ OptError::InputNotFound { .. }) => {
            clilog::warn!(OPT_NO_BUFFERS, "{}, continuing without buffers", e);
            vec![]
        }
        Err(e) => return Err(e.into())
    };
    let (mut tree, drivers) = read_net_file(&args.net)?;
    clilog::info!("net has {} nodes, {} drivers; library has {} buffers",
                  tree.len(), drivers.len(), buffers.len());

    let config = OptimizerConfig {
        max_segments_per_wire: args.max_segments,
        pin_capacitance_limit: args.cap_limit.unwrap_or(f64::MAX),
        ..Default::default()
    };
    let ids = NodeIdAllocator::new(tree.max_id() + 1);
    let mut van = VanGinneken::with_config(&buffers, &config);
    let timer = clilog::stimer!("van ginneken");
    let inserted = segment_and_optimize(
        &mut van, &mut tree, &drivers, config.max_segments_per_wire, &ids);
    clilog::finish!(timer);
    clilog::info!("segmentation added {} candidates", inserted);

    let name = args.net.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result = NetResult::collect(&van, name, 0, true);
    match &args.output {
        Some(path) => {
            let f = std::fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let mut buf = std::io::BufWriter::new(f);
            write_report(&mut buf, &result, args.all)?;
        }
        None => write_report(&mut std::io::stdout().lock(), &result, args.all)?
    }
    log_peak_memory();
    Ok(())
}

fn main() {
    clilog::init_stderr_color_debug();
    let args = <OptimizeNetArgs as clap::Parser>::parse();
    clilog::info!("optimize_net args:\n{:#?}", args);
    if let Err(e) = run(&args) {
        clilog::error!("{:#}", e);
        std::process::exit(-1);
    }
}
