// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics and symbol listing shared by the pass driver and the CLI.

pub mod error;
pub mod listing;
