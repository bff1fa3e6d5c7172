// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agsync-core: shared model for the offline-first sync subsystem
//!
//! This crate provides:
//! - The queued-operation model and its state machine states
//! - Payload validation for each operation kind
//! - Retry policy (exponential backoff with jitter)
//! - Clock and id abstractions for deterministic tests
//! - TOML configuration

pub mod clock;
pub mod config;
pub mod id;
pub mod operation;
pub mod retry;
pub mod status;
pub mod validate;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    ConfigError, ConnectivityConfig, CoordinatorConfig, QueueConfig, RemoteConfig, RetryConfig,
    StorageConfig, SyncConfig,
};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use operation::{
    EntityKey, OperationKind, OperationState, QueuedOperation, RemoteOutcome, UnknownKind,
};
pub use retry::RetryPolicy;
pub use status::{QueueCounts, SyncStatus};
pub use validate::{validate_submission, ValidationError};
