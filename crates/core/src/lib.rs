// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kagent-core: message envelope, channel pair and reconciliation data model
//! shared by the kagent daemon.

pub mod chan;
pub mod command;
pub mod env;
pub mod packet;
pub mod resource;
pub mod sync_event;

pub use chan::{CrChan, CrChanReceivers};
pub use env::{AgentInitPayload, EnvDeletePayload, EnvParas, ResourceDeletePayload};
pub use packet::{env_key, extract_namespace, Packet, PacketError};
pub use resource::{
    ObjectIdentity, Resource, ResourceError, ResourceId, ResourceMeta, SyncAction, SyncDef,
};
pub use sync_event::{FileCommit, ResourceCommit, SyncEvent, SyncEventMetadata, SyncResourceError};
