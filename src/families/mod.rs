// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU families and their addressing-mode resolvers.

pub mod intel8080;
pub mod m6800;
pub mod mos6502;
