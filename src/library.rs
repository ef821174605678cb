// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Buffer and driver cell library.
//!
//! A library is a flat list of characterized cells. The same record
//! type describes buffers/inverters that may be inserted into the tree
//! and the candidate cells that may drive the net.

use compact_str::CompactString;
use std::path::Path;
use crate::error::{OptError, Result};

/// Cells with this name are treated as inverting.
pub const INVERTER_NAME: &str = "inverter";

/// Library capacitances are given in fF and stored in pF.
pub const CAPACITANCE_SCALE: f64 = 1000.0;

/// One characterized library cell.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferCell {
    pub name: CompactString,
    /// whether the output is inverted w.r.t. the input.
    pub inverting: bool,
    /// input pin capacitance, in pF.
    pub capacitance: f64,
    /// intrinsic delay.
    pub delay: f64,
    /// output driving resistance.
    pub resistance: f64,
    pub area: f64,
}

impl BufferCell {
    pub fn new(
        name: &str,
        capacitance: f64, delay: f64, resistance: f64, area: f64
    ) -> BufferCell {
        BufferCell {
            name: CompactString::new(name),
            inverting: name == INVERTER_NAME,
            capacitance, delay, resistance, area
        }
    }

    /// parse one `name cap delay res [area]` record.
    ///
    /// the capacitance field is rescaled from library units to pF.
    fn from_fields(fields: &[&str]) -> Option<BufferCell> {
        if fields.len() != 4 && fields.len() != 5 {
            return None
        }
        let num = |i: usize| fields[i].parse::<f64>().ok();
        let area = match fields.get(4) {
            Some(_) => num(4)?,
            None => 0.0
        };
        Some(BufferCell::new(
            fields[0],
            num(1)? / CAPACITANCE_SCALE, num(2)?, num(3)?, area
        ))
    }
}

/// Sort cells by decreasing input capacitance.
///
/// The sort is stable so equal-capacitance cells keep file order,
/// which keeps buffer type indices reproducible.
pub fn sort_by_capacitance(cells: &mut [BufferCell]) {
    cells.sort_by(|a, b| b.capacitance.total_cmp(&a.capacitance));
}

/// Parse a library from text, one record per line.
///
/// Blank lines and `#` comments are skipped.
pub fn parse_cell_records(
    text: &str, path: &Path
) -> Result<Vec<BufferCell>> {
    let mut cells = Vec::new();
    for (line_i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        match BufferCell::from_fields(&fields) {
            Some(cell) => cells.push(cell),
            None => return Err(OptError::Malformed {
                path: path.to_path_buf(),
                line: line_i + 1,
                msg: format!("expecting `name cap delay res [area]`, got `{}`", line),
            })
        }
    }
    Ok(cells)
}

/// Read a buffer library file. The result is sorted by decreasing
/// capacitance.
pub fn read_buffer_library(path: &Path) -> Result<Vec<BufferCell>> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        OptError::InputNotFound { path: path.to_path_buf(), source }
    })?;
    let mut cells = parse_cell_records(&text, path)?;
    sort_by_capacitance(&mut cells);
    clilog::debug!("read {} cells from {}", cells.len(), path.display());
    Ok(cells)
}

/// Find a cell by its library name.
pub fn find_cell<'l>(cells: &'l [BufferCell], name: &str) -> Option<&'l BufferCell> {
    cells.iter().find(|c| c.name.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_are_rescaled_and_sorted() {
        let text = "\
# name cap delay res
buf_small 2 30 400
inverter 5 20 250 1.5

buf_big 10 40 100 3
";
        let mut cells = parse_cell_records(text, Path::new("lib.txt")).unwrap();
        sort_by_capacitance(&mut cells);
        let names = cells.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["buf_big", "inverter", "buf_small"]);
        assert_eq!(cells[0].capacitance, 0.01);
        assert_eq!(cells[0].area, 3.0);
        assert!(cells[1].inverting);
        assert!(!cells[2].inverting);
        assert_eq!(cells[2].area, 0.0);
    }

    #[test]
    fn bad_record_reports_line() {
        let err = parse_cell_records("a 1 2 3\nb 1 x 3\n", Path::new("l"))
            .unwrap_err();
        match err {
            OptError::Malformed { line, .. } => assert_eq!(line, 2),
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let err = read_buffer_library(Path::new("/nonexistent/buffers.lib"))
            .unwrap_err();
        assert!(matches!(err, OptError::InputNotFound { .. }));
    }
}
