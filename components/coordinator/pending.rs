/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bookkeeping for render processes created speculatively during a process
//! swap.
//!
//! When a navigation decision produces a fresh site instance, the embedding
//! framework launches a new ("pending") process before the navigation is
//! confirmed. Until then, the content the pending process answers for still
//! physically lives in its predecessor. This table remembers that
//! association so a caller holding only the pending process id can reach the
//! right content container.
//!
//! Entries hold raw ids, not owning references; the table never extends a
//! process's lifetime. Lookups are therefore validated against the live
//! process registry.

use base::id::ProcessId;
use browser_traits::ProcessRegistry;
use log::warn;
use rustc_hash::FxHashMap;

/// Maps each pending process to the already-running process it stands in
/// for. Entries are one hop only: values are never themselves keys.
pub struct PendingProcessTable {
    entries: FxHashMap<ProcessId, ProcessId>,
}

impl PendingProcessTable {
    pub fn new() -> PendingProcessTable {
        PendingProcessTable {
            entries: FxHashMap::default(),
        }
    }

    /// Remember that `pending` continues from `current`.
    ///
    /// If `current` is itself a pending process, the entry is collapsed to
    /// point at its resolution, keeping every entry a single hop and making
    /// cycles impossible.
    pub fn record(&mut self, pending: ProcessId, current: ProcessId) {
        if pending == current {
            warn!("Refusing pending-process entry mapping {} to itself.", pending);
            return;
        }
        let current = self.entries.get(&current).copied().unwrap_or(current);
        if current == pending {
            warn!("Refusing cyclic pending-process entry for {}.", pending);
            return;
        }
        self.entries.insert(pending, current);
    }

    /// The process that currently answers for `process`: the mapped current
    /// process when a live pending entry exists, otherwise the input
    /// unchanged. Ids are weak associations, so a mapping whose target is no
    /// longer live is treated as absent.
    pub fn resolve(&self, process: ProcessId, registry: &dyn ProcessRegistry) -> ProcessId {
        match self.entries.get(&process) {
            Some(&current) if registry.is_live(current) => current,
            Some(_) | None => process,
        }
    }

    /// The raw mapping for `process`, without the liveness check. Mostly
    /// useful to assert table state.
    pub fn get(&self, process: ProcessId) -> Option<ProcessId> {
        self.entries.get(&process).copied()
    }

    /// The pending process was confirmed; its entry is no longer needed.
    pub fn promote(&mut self, pending: ProcessId) -> Option<ProcessId> {
        self.entries.remove(&pending)
    }

    /// A process went away. Remove every entry in which it appears, whether
    /// as the pending key (at most one, ids are unique) or as the
    /// current-process value (possibly several).
    pub fn on_process_terminated(&mut self, process: ProcessId) {
        self.entries
            .retain(|&pending, &mut current| pending != process && current != process);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingProcessTable {
    fn default() -> PendingProcessTable {
        PendingProcessTable::new()
    }
}
