// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Convergence planning: which objects to apply and which to delete.

use std::collections::HashSet;

use kagent_core::{Resource, ResourceId, SyncDef};

/// Build the batch for one pass.
///
/// Everything in `changed` is applied. A live object is deleted when its id
/// is absent from the full `desired` set. When `allow_deletes` is false (the
/// desired set is known to be incomplete) nothing is deleted.
pub fn plan(
    desired: &[Resource],
    changed: Vec<Resource>,
    live: Vec<Resource>,
    allow_deletes: bool,
) -> SyncDef {
    let deletes = if allow_deletes {
        let wanted: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();
        let mut seen = HashSet::new();
        live.into_iter()
            .filter(|r| !wanted.contains(&r.id))
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    } else {
        Vec::new()
    };
    SyncDef::new(changed, deletes)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
