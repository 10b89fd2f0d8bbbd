/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Contracts between the browsing-session coordinator and the subsystems
//! that surround it: content containers, site instances, render-process
//! bookkeeping, the optional extension policy, and the script runtime.
//!
//! The coordinator only ever talks to these collaborators through the traits
//! in this crate. Their real implementations live in the embedding layer and
//! are replaced by mocks in tests.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use base::id::{BrowsingContextId, ProcessId, RoutingId, SessionId, WindowId};
use serde::{Deserialize, Serialize};
use url::Url;

/// The scheme of navigations that only run script in the existing document.
/// Such navigations must never trigger a process change.
pub const JAVASCRIPT_SCHEME: &str = "javascript";

/// The loading state of a content container, as exposed in tab metadata
/// snapshots.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
}

/// A typed message sent from the coordinator to the frames of a content
/// container. Frame-side code uses these to tag outgoing messages with the
/// owning session, and to know which window currently hosts it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FrameMessage {
    /// Tell a frame which session id owns it.
    SetSessionId(SessionId),
    /// Tell a frame which window its tab now belongs to.
    UpdateWindowId(WindowId),
}

/// The coordinator's view of the content of a tab. The embedding layer owns
/// the real thing; the coordinator never extends its lifetime beyond the
/// `Rc` handles it is given.
pub trait ContentContainer {
    /// The most recently committed URL.
    fn url(&self) -> Url;

    /// The title of the most recently loaded page.
    fn title(&self) -> String;

    fn load_status(&self) -> LoadStatus;

    fn is_audible(&self) -> bool;

    fn is_muted(&self) -> bool;

    /// Whether this container belongs to a private browsing context.
    fn is_private(&self) -> bool;

    /// The process and routing endpoint currently hosting this container.
    /// Changes on process swap and on crash-and-reload.
    fn process_ref(&self) -> (ProcessId, RoutingId);

    /// The routing ids of every live frame in this container.
    fn frames(&self) -> Vec<RoutingId>;

    fn send_to_frame(&self, frame: RoutingId, message: FrameMessage);

    fn send_to_all_frames(&self, message: FrameMessage) {
        for frame in self.frames() {
            self.send_to_frame(frame, message);
        }
    }
}

/// Maps process/routing endpoints back to live content containers.
pub trait ContainerRegistry {
    /// The container whose main endpoint lives in `process`, if any. Some
    /// processes (service workers, for example) have no associated
    /// container.
    fn container_by_process(&self, process: ProcessId) -> Option<Rc<dyn ContentContainer>>;

    /// The container hosted at exactly this process/routing pair, if any.
    fn container_by_routing(
        &self,
        process: ProcessId,
        routing: RoutingId,
    ) -> Option<Rc<dyn ContentContainer>>;
}

/// The unit the embedding framework uses to decide which process can host
/// which pages.
pub trait SiteInstance {
    /// The site URL this instance was created for.
    fn site_url(&self) -> Url;

    /// The id of the process currently assigned to this instance, if one has
    /// been assigned.
    fn process(&self) -> Option<ProcessId>;
}

/// Creates site instances scoped to a browsing context.
pub trait SiteInstanceFactory {
    fn create_for_url(
        &self,
        browsing_context: BrowsingContextId,
        url: &Url,
    ) -> Rc<dyn SiteInstance>;
}

/// A view of the set of live render processes. Pending-process entries hold
/// raw ids, not owning references, so every lookup is validated against this
/// registry.
pub trait ProcessRegistry {
    fn is_live(&self, process: ProcessId) -> bool;

    /// Ask to be notified (via `SessionCoordinator::on_process_terminated`)
    /// when `process` goes away.
    fn watch_termination(&self, process: ProcessId);
}

/// What the extension-aware policy decided about a navigation, when it
/// decided anything at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtensionPolicyDecision {
    /// The navigation must not happen.
    Veto,
    /// The navigation must stay in the current process.
    ForceCurrentInstance,
    /// The navigation must get a fresh site instance.
    ForceNewInstance,
}

/// The extension-aware half of the process assignment policy. This is a
/// capability object: when the embedder was built without extension support
/// it simply never supplies one, and the default policy runs unconditionally.
///
/// Every method may decline to decide by returning `None`; declining is not
/// an error and falls through to the default policy.
pub trait ExtensionPolicyOracle {
    fn override_navigation(
        &self,
        current_instance: &dyn SiteInstance,
        from_url: &Url,
        to_url: &Url,
    ) -> Option<ExtensionPolicyDecision>;

    fn should_allow_open_url(
        &self,
        site_instance: &dyn SiteInstance,
        from_url: &Url,
        url: &Url,
    ) -> Option<bool>;

    fn should_use_process_per_site(
        &self,
        browsing_context: BrowsingContextId,
        effective_url: &Url,
    ) -> Option<bool>;

    fn should_swap_browsing_instances(
        &self,
        site_instance: &dyn SiteInstance,
        current_url: &Url,
        new_url: &Url,
    ) -> Option<bool>;
}

/// Where a window-open request wants its result to appear.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowOpenDisposition {
    CurrentTab,
    NewForegroundTab,
    NewBackgroundTab,
    NewWindow,
    NewPopup,
}

/// Everything known about a candidate navigation or window-open request.
/// Transient: computed fresh per request, never persisted.
#[derive(Clone, Debug)]
pub struct NavigationRequest {
    pub opener_url: Url,
    pub source_origin: Url,
    pub target_url: Url,
    pub disposition: WindowOpenDisposition,
    pub user_gesture: bool,
}

/// The embedder's veto point for window creation. Without a delegate, window
/// creation is always allowed.
pub trait WindowOpenDelegate {
    fn can_create_window(&self, request: &NavigationRequest) -> bool;
}

/// When injected script should run relative to document load.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunAt {
    Undefined,
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
}

/// A request to run script inside a tab's document.
#[derive(Clone, Debug)]
pub struct ScriptInjection {
    pub code: String,
    /// Run in every frame of the tab, not just the main frame.
    pub all_frames: bool,
    /// Target a specific frame. `None` means the top frame.
    pub frame_routing_id: Option<RoutingId>,
    pub run_at: RunAt,
}

/// Dispatches script injections into the frames of one content container.
/// Owned by the container; the coordinator only holds a handle.
pub trait ScriptDispatcher {
    fn dispatch(&self, injection: ScriptInjection);
}

/// How much memory trouble the platform reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryPressureLevel {
    Moderate,
    Critical,
}

/// A failure reported by an external collaborator. The coordinator
/// propagates these without retrying; retry policy belongs to the embedding
/// framework.
#[derive(Debug)]
pub struct ExternalFailure(pub String);

impl fmt::Display for ExternalFailure {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "collaborator failure: {}", self.0)
    }
}

impl Error for ExternalFailure {}

/// The script-engine environment, driven through the fixed lifecycle phases.
/// The coordinator never blocks on background engine work: at shutdown the
/// runtime is deliberately leaked instead of torn down.
pub trait ScriptRuntime {
    /// Construct the script-engine environment and its runtime bindings.
    fn create_environment(&mut self) -> Result<(), ExternalFailure>;

    /// Enter the global execution context.
    fn enter_context(&mut self);

    /// Exit the global execution context.
    fn exit_context(&mut self);

    /// Load the runtime environment (run startup scripts).
    fn load_environment(&mut self);

    fn on_message_loop_created(&mut self);

    fn on_message_loop_destroying(&mut self);

    /// Periodic idle hook; used for idle garbage collection.
    fn idle_notification(&mut self);

    /// The platform reported memory pressure; release what can be released.
    fn low_memory_notification(&mut self);
}
