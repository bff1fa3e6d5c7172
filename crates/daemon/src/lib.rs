// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agsyncd library: wire protocol and filesystem layout shared with the CLI

pub mod paths;
pub mod protocol;

pub use paths::{Paths, PathsError};
pub use protocol::{ProtocolError, Request, Response};
