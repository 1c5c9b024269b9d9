// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kagent daemon library
//!
//! Everything that runs inside `kagentd`: the transport to the control
//! plane, command dispatch, per-namespace reconciliation and the cluster
//! applier.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod dispatch;
pub mod engine;
pub mod env;
pub mod lifecycle;
pub mod supervisor;
pub mod syncer;

pub use lifecycle::{Args, Config, Daemon, LifecycleError};
