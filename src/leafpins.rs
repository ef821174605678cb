// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Pin directions of leaf cells in a buffered netlist.

use compact_str::CompactString;
use netlistdb::{Direction, LeafPinProvider};
use sverilogparse::SVerilogRange;

/// Output pin names used by common standard cell libraries.
pub const OUTPUT_PIN_NAMES: [&str; 7] = ["Y", "Z", "ZN", "Q", "QN", "X", "O"];

/// This implements direction and width providers for standard
/// cells, following the usual output pin naming.
///
/// All pins are scalar.
pub struct StdCellLeafPins();

impl LeafPinProvider for StdCellLeafPins {
    fn direction_of(
        &self,
        macro_name: &CompactString,
        pin_name: &CompactString, pin_idx: Option<isize>
    ) -> Direction {
        if pin_idx.is_some() {
            clilog::warn!(OPT_BUS_PIN,
                          "bus pin {}[{:?}] on macro {} treated as scalar",
                          pin_name, pin_idx, macro_name);
        }
        match OUTPUT_PIN_NAMES.contains(&pin_name.as_str()) {
            true => Direction::O,
            false => Direction::I
        }
    }

    fn width_of(
        &self,
        _macro_name: &CompactString,
        _pin_name: &CompactString
    ) -> Option<SVerilogRange> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Y", Direction::O)]
    #[test_case("ZN", Direction::O)]
    #[test_case("QN", Direction::O)]
    #[test_case("A", Direction::I)]
    #[test_case("CLK", Direction::I)]
    fn directions_follow_pin_names(pin: &str, dir: Direction) {
        let pins = StdCellLeafPins();
        let got = pins.direction_of(
            &CompactString::new("BUF_X1"), &CompactString::new(pin), None);
        assert!(got == dir);
        assert!(pins.width_of(&CompactString::new("BUF_X1"),
                              &CompactString::new(pin)).is_none());
    }
}
