/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The `SessionCoordinator` owns all browsing-session state for the process:
//! the identity tables, the per-tab session records, the pending-process
//! table and the process assignment policy. It is constructed once by the
//! process entry point and threaded explicitly through everything that needs
//! it; there is no globally reachable instance.

use std::rc::Rc;

use base::id::{BrowsingContextId, ProcessId, RoutingId, SessionId, WindowId};
use browser_traits::{
    ContainerRegistry, ContentContainer, ExtensionPolicyOracle, NavigationRequest,
    ProcessRegistry, ScriptDispatcher, ScriptInjection, SiteInstance, SiteInstanceFactory,
    WindowOpenDelegate,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use url::Url;

use crate::identity::IdentityAllocator;
use crate::message_loop::LocalTaskSender;
use crate::pending::PendingProcessTable;
use crate::policy::{NavigationOutcome, ProcessAssignmentPolicy};
use crate::tab_session::TabSession;

/// Everything needed to construct a [`SessionCoordinator`]. Supplied by the
/// process entry point.
pub struct InitialCoordinatorState {
    /// The factory producing site instances for navigation targets.
    pub site_instance_factory: Rc<dyn SiteInstanceFactory>,

    /// The live-process view used to validate pending-process lookups and to
    /// subscribe to termination notifications.
    pub process_registry: Rc<dyn ProcessRegistry>,

    /// Maps process/routing endpoints back to content containers.
    pub container_registry: Rc<dyn ContainerRegistry>,

    /// The extension-aware policy, when built with extension support.
    pub extension_policy: Option<Rc<dyn ExtensionPolicyOracle>>,

    /// A handle for deferring work on the coordinator thread's own message
    /// loop. The coordinator lives on that thread, so its posts never cross
    /// threads.
    pub local_task_sender: LocalTaskSender,
}

/// The single per-process coordinator of browsing sessions, navigation
/// process assignment and speculative-process bookkeeping.
pub struct SessionCoordinator {
    identity: IdentityAllocator,
    sessions: FxHashMap<SessionId, TabSession>,
    pending_processes: PendingProcessTable,
    policy: ProcessAssignmentPolicy,
    site_instance_factory: Rc<dyn SiteInstanceFactory>,
    process_registry: Rc<dyn ProcessRegistry>,
    container_registry: Rc<dyn ContainerRegistry>,
    tasks: LocalTaskSender,
}

impl SessionCoordinator {
    pub fn new(state: InitialCoordinatorState) -> SessionCoordinator {
        SessionCoordinator {
            identity: IdentityAllocator::new(),
            sessions: FxHashMap::default(),
            pending_processes: PendingProcessTable::new(),
            policy: ProcessAssignmentPolicy::new(state.extension_policy),
            site_instance_factory: state.site_instance_factory,
            process_registry: state.process_registry,
            container_registry: state.container_registry,
            tasks: state.local_task_sender,
        }
    }

    /// Associate a content container with a new browsing session and return
    /// its id.
    pub fn create_session(
        &mut self,
        window_id: WindowId,
        container: Rc<dyn ContentContainer>,
        script_dispatcher: Rc<dyn ScriptDispatcher>,
    ) -> SessionId {
        let session = TabSession::new(&mut self.identity, window_id, container, script_dispatcher);
        let session_id = session.session_id();
        self.sessions.insert(session_id, session);
        debug!("Created session {}.", session_id);
        session_id
    }

    /// A container was cloned; the clone gets a fresh session of its own.
    pub fn clone_session(
        &mut self,
        source: SessionId,
        window_id: WindowId,
        new_container: Rc<dyn ContentContainer>,
        script_dispatcher: Rc<dyn ScriptDispatcher>,
    ) -> SessionId {
        if !self.sessions.contains_key(&source) {
            warn!("Cloning from unknown session {}.", source);
        }
        self.create_session(window_id, new_container, script_dispatcher)
    }

    /// The container backing `session_id` was destroyed. Every table entry
    /// keyed by the session id is removed; the id itself is never reused.
    pub fn destroy_session(&mut self, session_id: SessionId) {
        if self.sessions.remove(&session_id).is_none() {
            warn!("Destroying unknown session {}.", session_id);
        }
        self.identity.remove_session(session_id);
    }

    pub fn set_active(&mut self, session_id: SessionId, active: bool) {
        let Some(session) = self.sessions.get(&session_id) else {
            return warn!("Activation change for unknown session {}.", session_id);
        };
        session.set_active(&mut self.identity, active);
    }

    pub fn set_window_id(&mut self, session_id: SessionId, window_id: WindowId) {
        match self.sessions.get_mut(&session_id) {
            Some(session) => session.set_window_id(window_id),
            None => warn!("Window change for unknown session {}.", session_id),
        }
    }

    pub fn set_tab_properties(&mut self, session_id: SessionId, values: Map<String, Value>) {
        match self.sessions.get_mut(&session_id) {
            Some(session) => session.set_properties(values),
            None => warn!("Properties for unknown session {}.", session_id),
        }
    }

    /// Snapshot the tab metadata of `session_id`. A pure read.
    pub fn tab_value(&self, session_id: SessionId) -> Option<Map<String, Value>> {
        self.sessions
            .get(&session_id)
            .map(|session| session.tab_value(&self.identity))
    }

    pub fn execute_script(&self, session_id: SessionId, injection: ScriptInjection) {
        match self.sessions.get(&session_id) {
            Some(session) => session.execute_script(injection),
            None => warn!("Script injection for unknown session {}.", session_id),
        }
    }

    /// A frame appeared in the session's container after creation; it gets
    /// the same session-id propagation as the original frames.
    pub fn notify_frame_created(&self, session_id: SessionId, routing: RoutingId) {
        if let Some(session) = self.sessions.get(&session_id) {
            session.on_frame_created(routing);
        }
    }

    /// The session's container moved to a different process.
    pub fn notify_process_changed(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.get(&session_id) else {
            return warn!("Process change for unknown session {}.", session_id);
        };
        session.on_process_changed(&mut self.identity);
    }

    /// The process/routing endpoint hosting `session_id`, if it is alive.
    pub fn lookup(&self, session_id: SessionId) -> Option<(ProcessId, RoutingId)> {
        self.identity.lookup(session_id)
    }

    pub fn active_tab(&self, window_id: WindowId) -> Option<SessionId> {
        self.identity.active_tab(window_id)
    }

    /// The content container that currently answers for `process`. If the
    /// process is a pending process, the lookup is redirected to the process
    /// the content still physically lives in.
    pub fn container_by_process(&self, process: ProcessId) -> Option<Rc<dyn ContentContainer>> {
        let process = self
            .pending_processes
            .resolve(process, &*self.process_registry);
        self.container_registry.container_by_process(process)
    }

    /// The content container of `session_id`, resolved through the
    /// process/routing tables and verified to still belong to that session.
    pub fn container_for_session(
        &self,
        session_id: SessionId,
    ) -> Option<Rc<dyn ContentContainer>> {
        let (process, routing) = self.identity.lookup(session_id)?;
        let container = self
            .container_registry
            .container_by_routing(process, routing)?;
        let session = self.sessions.get(&session_id)?;
        // The routing pair may have been reused; the round trip must come
        // back to the same container this session owns. Compare allocation
        // addresses, not fat pointers, so distinct vtables cannot lie.
        let found = Rc::as_ptr(&container) as *const ();
        let owned = Rc::as_ptr(session.container()) as *const ();
        if found != owned {
            return None;
        }
        Some(container)
    }

    /// The process that answers for `process` (see
    /// [`PendingProcessTable::resolve`]).
    pub fn resolve_process(&self, process: ProcessId) -> ProcessId {
        self.pending_processes
            .resolve(process, &*self.process_registry)
    }

    /// A speculative process was confirmed; stop redirecting lookups for it.
    pub fn promote_pending_process(&mut self, process: ProcessId) {
        if self.pending_processes.promote(process).is_none() {
            debug!("Promoted {} had no pending entry.", process);
        }
    }

    /// A render process terminated. Delivered on the coordinator thread
    /// strictly before any later navigation decision can observe the id.
    pub fn on_process_terminated(&mut self, process: ProcessId) {
        debug!("Process {} terminated.", process);
        self.pending_processes.on_process_terminated(process);
    }

    /// Prevent a process restart for exactly the next navigation.
    pub fn suppress_process_restart_for_once(&mut self) {
        self.policy.suppress_process_restart_for_once();
    }

    pub fn set_window_open_delegate(&mut self, delegate: Rc<dyn WindowOpenDelegate>) {
        self.policy.set_window_open_delegate(delegate);
    }

    /// Decide which site instance the navigation to `url` executes in, and
    /// when the decision produces a process distinct from the current one,
    /// remember the speculative process and watch both processes for
    /// termination.
    pub fn decide_navigation(
        &mut self,
        browsing_context: BrowsingContextId,
        current_instance: &Rc<dyn SiteInstance>,
        url: &Url,
    ) -> NavigationOutcome {
        let outcome = self.policy.site_instance_for_navigation(
            browsing_context,
            current_instance,
            url,
            &*self.site_instance_factory,
            &self.tasks,
        );
        if let NavigationOutcome::NewInstanceForUrl(new_instance) = &outcome {
            if let (Some(current), Some(pending)) =
                (current_instance.process(), new_instance.process())
            {
                if pending != current {
                    self.pending_processes.record(pending, current);
                    self.process_registry.watch_termination(current);
                    self.process_registry.watch_termination(pending);
                }
            }
        }
        outcome
    }

    pub fn should_allow_open_url(&self, site_instance: &dyn SiteInstance, url: &Url) -> bool {
        self.policy.should_allow_open_url(site_instance, url)
    }

    pub fn should_use_process_per_site(
        &self,
        browsing_context: BrowsingContextId,
        effective_url: &Url,
    ) -> bool {
        self.policy
            .should_use_process_per_site(browsing_context, effective_url)
    }

    pub fn should_swap_browsing_instances(
        &self,
        site_instance: &dyn SiteInstance,
        current_url: &Url,
        new_url: &Url,
    ) -> bool {
        self.policy
            .should_swap_browsing_instances(site_instance, current_url, new_url)
    }

    pub fn can_create_window(&self, request: &NavigationRequest) -> bool {
        self.policy.can_create_window(request)
    }

    /// The number of pending-process entries currently held. Diagnostic.
    pub fn pending_process_count(&self) -> usize {
        self.pending_processes.len()
    }
}
