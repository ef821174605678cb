// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Text reports.

use std::io::{self, Write};
use crate::levels::NetResult;

/// Write the report of one net.
///
/// The best solution is the one with the largest time. Its buffer
/// insertions are listed breadth-first from the source. With `all`,
/// every returned solution is appended.
pub fn write_report<W: Write>(
    w: &mut W, result: &NetResult, all: bool
) -> io::Result<()> {
    let best = match result.best() {
        Some(best) => best,
        None => return writeln!(w, "no solution available!")
    };
    writeln!(w, "total solutions:{}", result.solutions.len())?;
    writeln!(w, "best(t,c,a)=({},{},{})", best.time, best.capacitance, best.area)?;
    for ins in result.buffer_insertions(best) {
        writeln!(w, "start {} end {} buffertype {}", ins.from, ins.to, ins.cell)?;
    }
    if all {
        writeln!(w, "\n\nall solutions:")?;
        for s in &result.solutions {
            writeln!(w, "(t,c,a)=({},{},{})", s.time, s.capacitance, s.area)?;
        }
    }
    Ok(())
}

/// Render a size in KB with a human unit.
pub fn format_memory(kb: f64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    let mut value = kb;
    let mut unit = 0;
    while value > 900. && unit + 1 < UNITS.len() {
        value /= 1024.;
        unit += 1;
    }
    match value < 2. {
        true => format!("{:.2} [{}]", value, UNITS[unit]),
        false => format!("{:.1} [{}]", value, UNITS[unit])
    }
}

/// Peak resident and virtual memory in KB, from a
/// `/proc/<pid>/status` text.
pub fn parse_peak_memory(status: &str) -> (Option<f64>, Option<f64>) {
    let field = |name: &str| status.lines()
        .find_map(|l| l.strip_prefix(name))
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse::<f64>().ok());
    (field("VmHWM:"), field("VmPeak:"))
}

/// Log the peak memory usage of this process.
pub fn log_peak_memory() {
    let status = match std::fs::read_to_string("/proc/self/status") {
        Ok(s) => s,
        Err(_) => {
            clilog::info!("memory info unknown");
            return
        }
    };
    match parse_peak_memory(&status) {
        (Some(real), Some(virt)) => {
            clilog::info!("peak real memory usage: {}", format_memory(real));
            clilog::info!("peak virtual memory usage: {}", format_memory(virt));
        }
        _ => clilog::info!("memory info unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionGraph, DecisionKind, PersistedDecision};
    use crate::levels::PersistedSolution;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn sample() -> NetResult {
        let decisions = DecisionGraph { nodes: vec![
            PersistedDecision {
                kind: DecisionKind::Buffer { cell: 1, from: 4, to: 2 },
                left: None, right: None
            },
            PersistedDecision {
                kind: DecisionKind::Buffer { cell: 0, from: 5, to: 3 },
                left: None, right: None
            },
            PersistedDecision { kind: DecisionKind::Merge, left: Some(0), right: Some(1) },
        ]};
        NetResult {
            net: "n1".into(),
            level: 0,
            solutions: vec![
                PersistedSolution { time: 12.5, capacitance: 0.3, area: 2., driver: 0, root: Some(2) },
                PersistedSolution { time: 10., capacitance: 0.1, area: 1., driver: 0, root: None },
            ],
            decisions,
        }
    }

    #[test]
    fn best_and_trace() {
        let mut out = Vec::new();
        write_report(&mut out, &sample(), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\
total solutions:2
best(t,c,a)=(12.5,0.3,2)
start 4 end 2 buffertype 1
start 5 end 3 buffertype 0
");
    }

    #[test]
    fn all_solutions_section() {
        let mut out = Vec::new();
        write_report(&mut out, &sample(), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\n\n\nall solutions:\n(t,c,a)=(12.5,0.3,2)\n(t,c,a)=(10,0.1,1)\n"));
    }

    #[test]
    fn empty_result() {
        let mut result = sample();
        result.solutions.clear();
        let mut out = Vec::new();
        write_report(&mut out, &result, true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no solution available!\n");
    }

    #[test_case(512., "512.0 [KB]")]
    #[test_case(1536., "1.50 [MB]")]
    #[test_case(3. * 1024. * 1024., "3.0 [GB]")]
    fn memory_units(kb: f64, expect: &str) {
        assert_eq!(format_memory(kb), expect);
    }

    #[test]
    fn status_fields() {
        let status = "Name:\tvanbuf\nVmPeak:\t  204800 kB\nVmHWM:\t    1024 kB\n";
        assert_eq!(parse_peak_memory(status), (Some(1024.), Some(204800.)));
        assert_eq!(parse_peak_memory(""), (None, None));
    }
}
