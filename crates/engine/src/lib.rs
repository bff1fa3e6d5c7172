// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agsync sync engine: connectivity, execution, coordination, facade

mod client;
mod connectivity;
mod coordinator;
mod error;
mod executor;
mod scheduler;

pub use client::{SubmitResult, SyncClient};
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{DrainReport, SyncCoordinator, SyncEvent};
pub use error::SyncError;
pub use executor::{classify, Executor};
pub use scheduler::RetryScheduler;
