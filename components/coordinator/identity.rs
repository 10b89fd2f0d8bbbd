/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Session identity bookkeeping: the monotonic session-id counter, the table
//! mapping each session to the process/routing endpoint currently hosting
//! it, and the per-window active-tab index.
//!
//! All of this state is confined to the thread that owns browsing-session
//! state. Nothing here is shared or locked; other threads reach it by
//! posting tasks to the coordinator.

use base::id::{ProcessId, RoutingId, SessionId, WindowId};
use log::warn;
use rustc_hash::FxHashMap;

/// Issues session ids and tracks where each session currently lives.
pub struct IdentityAllocator {
    /// The next session id to hand out. Starts at 1 and only ever grows;
    /// ids are never reused, even after the owning tab closes.
    next_session_id: i32,

    /// For each live session, the process and routing endpoint hosting its
    /// content. Updated on every process swap or crash-and-reload.
    process_refs: FxHashMap<SessionId, (ProcessId, RoutingId)>,

    /// Which tab is currently foregrounded in each window. A window maps to
    /// at most one session at a time.
    active_tabs: FxHashMap<WindowId, SessionId>,
}

impl IdentityAllocator {
    pub fn new() -> IdentityAllocator {
        IdentityAllocator {
            next_session_id: SessionId::FIRST.value(),
            process_refs: FxHashMap::default(),
            active_tabs: FxHashMap::default(),
        }
    }

    /// Return the next session id. Never fails and never repeats.
    pub fn allocate_session_id(&mut self) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        id
    }

    /// Record (or update) the process/routing pair hosting `session_id`.
    pub fn record_process_ref(
        &mut self,
        session_id: SessionId,
        process: ProcessId,
        routing: RoutingId,
    ) {
        self.process_refs.insert(session_id, (process, routing));
    }

    /// The process/routing pair hosting `session_id`, if the session is
    /// still alive. Callers must treat `None` as "feature unavailable",
    /// never as fatal.
    pub fn lookup(&self, session_id: SessionId) -> Option<(ProcessId, RoutingId)> {
        self.process_refs.get(&session_id).copied()
    }

    /// Drop all table entries for a destroyed session.
    pub fn remove_session(&mut self, session_id: SessionId) {
        self.process_refs.remove(&session_id);
        self.active_tabs
            .retain(|_, active| *active != session_id);
    }

    /// Mark `session_id` as the active tab of `window_id`.
    pub fn record_active(&mut self, window_id: WindowId, session_id: SessionId) {
        self.active_tabs.insert(window_id, session_id);
    }

    /// Clear the active tab of `window_id`, but only if `session_id` is the
    /// tab currently recorded there. A stale "set inactive" from an
    /// already-superseded tab must not evict the new active tab.
    pub fn record_inactive(&mut self, window_id: WindowId, session_id: SessionId) {
        if self.active_tabs.get(&window_id) == Some(&session_id) {
            self.active_tabs.remove(&window_id);
        } else {
            warn!(
                "Stale inactive notification for {} in {}.",
                session_id, window_id
            );
        }
    }

    /// The active tab of `window_id`, if one is recorded.
    pub fn active_tab(&self, window_id: WindowId) -> Option<SessionId> {
        self.active_tabs.get(&window_id).copied()
    }

    /// Whether `session_id` is the active tab of `window_id`.
    pub fn is_active(&self, window_id: WindowId, session_id: SessionId) -> bool {
        self.active_tab(window_id) == Some(session_id)
    }
}

impl Default for IdentityAllocator {
    fn default() -> IdentityAllocator {
        IdentityAllocator::new()
    }
}
