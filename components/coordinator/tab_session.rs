/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-tab session state: the session id, the owning window, the accumulated
//! property bag used for tab metadata snapshots, and the handles to the
//! tab's content container and script dispatcher.

use std::rc::Rc;

use base::id::{RoutingId, SessionId, WindowId};
use browser_traits::{ContentContainer, FrameMessage, ScriptDispatcher, ScriptInjection};
use serde_json::{Map, Value};

use crate::identity::IdentityAllocator;

/// Keys of the live fields in a tab metadata snapshot.
pub mod keys {
    pub const ID: &str = "id";
    pub const TAB_ID: &str = "tabId";
    pub const WINDOW_ID: &str = "windowId";
    pub const INCOGNITO: &str = "incognito";
    pub const ACTIVE: &str = "active";
    pub const URL: &str = "url";
    pub const TITLE: &str = "title";
    pub const STATUS: &str = "status";
    pub const AUDIBLE: &str = "audible";
    pub const MUTED: &str = "muted";
}

/// The coordinator's record of one tab. Created when a content container is
/// first associated with a browsing session; destroyed with the container.
pub struct TabSession {
    session_id: SessionId,
    window_id: WindowId,

    /// Caller-supplied tab metadata, merged last-write-wins per key and
    /// folded into every snapshot.
    properties: Map<String, Value>,

    container: Rc<dyn ContentContainer>,

    /// The script-execution dispatcher owned by the tab's content container.
    script_dispatcher: Rc<dyn ScriptDispatcher>,
}

impl TabSession {
    /// Create the session: allocate its id, record where its content lives,
    /// and tell every live frame which session now owns it.
    pub fn new(
        identity: &mut IdentityAllocator,
        window_id: WindowId,
        container: Rc<dyn ContentContainer>,
        script_dispatcher: Rc<dyn ScriptDispatcher>,
    ) -> TabSession {
        let session_id = identity.allocate_session_id();
        let (process, routing) = container.process_ref();
        identity.record_process_ref(session_id, process, routing);
        container.send_to_all_frames(FrameMessage::SetSessionId(session_id));
        TabSession {
            session_id,
            window_id,
            properties: Map::new(),
            container,
            script_dispatcher,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub fn container(&self) -> &Rc<dyn ContentContainer> {
        &self.container
    }

    /// Attach the tab to a window. Renderer-side code holds the id of the
    /// window hosting it, so every frame is notified of the change.
    pub fn set_window_id(&mut self, window_id: WindowId) {
        self.window_id = window_id;
        self.container
            .send_to_all_frames(FrameMessage::UpdateWindowId(window_id));
    }

    /// Record this tab as (in)active in its window. Deactivation is guarded
    /// against stale calls by the identity allocator.
    pub fn set_active(&self, identity: &mut IdentityAllocator, active: bool) {
        if active {
            identity.record_active(self.window_id, self.session_id);
        } else {
            identity.record_inactive(self.window_id, self.session_id);
        }
    }

    /// Merge caller-supplied key/value pairs into the accumulated property
    /// bag. Last write wins per key.
    pub fn set_properties(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            self.properties.insert(key, value);
        }
    }

    /// A frame was created after the session (an in-page navigation, for
    /// example). It receives the same session-id propagation as the frames
    /// that existed at creation.
    pub fn on_frame_created(&self, routing: RoutingId) {
        self.container
            .send_to_frame(routing, FrameMessage::SetSessionId(self.session_id));
    }

    /// The container's hosting process changed (process swap or
    /// crash-and-reload); refresh the process-ref table.
    pub fn on_process_changed(&self, identity: &mut IdentityAllocator) {
        let (process, routing) = self.container.process_ref();
        identity.record_process_ref(self.session_id, process, routing);
    }

    /// Forward a script injection to the tab's dispatcher.
    pub fn execute_script(&self, injection: ScriptInjection) {
        self.script_dispatcher.dispatch(injection);
    }

    /// Snapshot the tab's metadata: the accumulated properties merged with
    /// freshly computed live fields. This is a pure read; it never mutates
    /// session state and is safe to call at any point between creation and
    /// destruction.
    pub fn tab_value(&self, identity: &IdentityAllocator) -> Map<String, Value> {
        let mut result = self.properties.clone();
        result.insert(keys::ID.into(), self.session_id.value().into());
        result.insert(keys::TAB_ID.into(), self.session_id.value().into());
        result.insert(keys::WINDOW_ID.into(), self.window_id.value().into());
        result.insert(keys::INCOGNITO.into(), self.container.is_private().into());
        result.insert(
            keys::ACTIVE.into(),
            identity.is_active(self.window_id, self.session_id).into(),
        );
        result.insert(keys::URL.into(), self.container.url().to_string().into());
        result.insert(keys::TITLE.into(), self.container.title().into());
        result.insert(
            keys::STATUS.into(),
            self.container.load_status().to_string().into(),
        );
        result.insert(keys::AUDIBLE.into(), self.container.is_audible().into());
        result.insert(keys::MUTED.into(), self.container.is_muted().into());
        result
    }
}
