// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand arguments and handlers

pub mod daemon;
pub mod queue;
