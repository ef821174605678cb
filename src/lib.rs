// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
pub mod error;

pub mod library;

pub mod rctree;

pub mod segment;

pub mod decision;

pub mod pareto;

pub mod van;

pub mod topology;

pub mod netfile;

pub mod leafpins;

pub mod netlist;

pub mod levels;

pub mod report;
