// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Buffer every net of a gate-level netlist, level by level.

use anyhow::Context;
use std::path::PathBuf;
use netlistdb::NetlistDB;
use vanbuf::leafpins::StdCellLeafPins;
use vanbuf::levels::{LevelScheduler, NetOutcome};
use vanbuf::library::read_buffer_library;
use vanbuf::netlist::NetlistNets;
use vanbuf::report::{log_peak_memory, write_report};
use vanbuf::topology::OptimizerConfig;

#[derive(clap::Parser, Debug)]
struct OptimizeNetsArgs {
    /// Gate-level verilog path.
    netlist_verilog: PathBuf,
    /// Top module type in netlist to analyze.
    ///
    /// If not specified, we will guess it from the hierarchy.
    #[clap(long)]
    top_module: Option<String>,
    /// Level file: `level <n>` tokens followed by pin paths.
    #[clap(short = 'l', long)]
    levels: PathBuf,
    /// Buffer library, one `name cap delay res [area]` record per line.
    #[clap(short = 'b', long)]
    buffers: PathBuf,
    /// Directory receiving one report per net.
    #[clap(short = 'o', long)]
    output_dir: PathBuf,
    /// Worker threads. 0 uses all cores.
    #[clap(short = 'j', long, default_value_t = 0)]
    jobs: usize,
    /// Maximum candidate nodes inserted on one wire.
    #[clap(long, default_value_t = 0)]
    max_segments: usize,
    /// Drop solutions whose driver load reaches this capacitance (pF).
    #[clap(long)]
    cap_limit: Option<f64>,
    /// Also dump all outcomes in BARE format.
    #[clap(long)]
    results_bin: Option<PathBuf>,
}

fn run(args: &OptimizeNetsArgs) -> anyhow::Result<()> {
    let buffers = read_buffer_library(&args.buffers)?;
    let config = OptimizerConfig {
        max_segments_per_wire: args.max_segments,
        pin_capacitance_limit: args.cap_limit.unwrap_or(f64::MAX),
        num_threads: args.jobs,
        ..Default::default()
    };

    let netlistdb = NetlistDB::from_sverilog_file(
        &args.netlist_verilog,
        args.top_module.as_deref(),
        &StdCellLeafPins()
    ).expect("cannot build netlist");
    let mut nets = NetlistNets::from_netlistdb(&netlistdb, &buffers, &config);
    drop(netlistdb);
    nets.read_levels(&args.levels)?;

    let timer = clilog::stimer!("optimize all levels");
    let mut scheduler = LevelScheduler::new(&nets, &buffers, config)?;
    let outcomes = scheduler.run();
    clilog::finish!(timer);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;
    let mut num_written = 0;
    for (i, outcome) in outcomes.iter().enumerate() {
        let result = match outcome {
            NetOutcome::Solved(r) => r,
            NetOutcome::Skipped { net, reason, .. } => {
                clilog::info!("net {} has no report: {}", net, reason);
                continue
            }
        };
        let path = args.output_dir.join(format!("result{}.out", i));
        let f = std::fs::File::create(&path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        let mut buf = std::io::BufWriter::new(f);
        write_report(&mut buf, result, false)?;
        num_written += 1;
    }
    clilog::info!("wrote {} reports to {}", num_written, args.output_dir.display());

    if let Some(path) = &args.results_bin {
        let f = std::fs::File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        let mut buf = std::io::BufWriter::new(f);
        serde_bare::to_writer(&mut buf, &outcomes)?;
    }
    log_peak_memory();
    Ok(())
}

fn main() {
    clilog::init_stderr_color_debug();
    clilog::set_max_print_count(clilog::Level::Warn, "NL_SV_LIT", 1);
    clilog::set_max_print_count(clilog::Level::Warn, "OPT_LOOKUP_MISS", 10);
    let args = <OptimizeNetsArgs as clap::Parser>::parse();
    clilog::info!("optimize_nets args:\n{:#?}", args);
    if let Err(e) = run(&args) {
        clilog::error!("{:#}", e);
        std::process::exit(-1);
    }
}
