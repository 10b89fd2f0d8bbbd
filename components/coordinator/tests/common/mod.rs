/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Hand-rolled mock collaborators shared by the coordinator tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use base::id::{BrowsingContextId, ProcessId, RoutingId, SessionId, WindowId};
use browser_traits::{
    ContainerRegistry, ContentContainer, ExtensionPolicyDecision, ExtensionPolicyOracle,
    FrameMessage, LoadStatus, NavigationRequest, ProcessRegistry, ScriptDispatcher,
    ScriptInjection, ScriptRuntime, SiteInstance, SiteInstanceFactory, WindowOpenDelegate,
    ExternalFailure,
};
use coordinator::{InitialCoordinatorState, MessageLoop, SessionCoordinator};
use url::Url;

pub fn url(spec: &str) -> Url {
    Url::parse(spec).expect("test URL must parse")
}

pub struct MockContainer {
    pub url: RefCell<Url>,
    pub title: RefCell<String>,
    pub loading: Cell<bool>,
    pub audible: Cell<bool>,
    pub muted: Cell<bool>,
    pub private: Cell<bool>,
    pub process_ref: Cell<(ProcessId, RoutingId)>,
    pub frames: RefCell<Vec<RoutingId>>,
    /// Every frame message sent through this container, in order.
    pub sent: RefCell<Vec<(RoutingId, FrameMessage)>>,
}

impl MockContainer {
    pub fn new(spec: &str, process: ProcessId, routing: RoutingId) -> Rc<MockContainer> {
        Rc::new(MockContainer {
            url: RefCell::new(url(spec)),
            title: RefCell::new(String::from("New Tab")),
            loading: Cell::new(false),
            audible: Cell::new(false),
            muted: Cell::new(false),
            private: Cell::new(false),
            process_ref: Cell::new((process, routing)),
            frames: RefCell::new(vec![routing]),
            sent: RefCell::new(Vec::new()),
        })
    }

    pub fn messages_of_kind(&self, session_id: SessionId) -> usize {
        self.sent
            .borrow()
            .iter()
            .filter(|(_, message)| *message == FrameMessage::SetSessionId(session_id))
            .count()
    }
}

impl ContentContainer for MockContainer {
    fn url(&self) -> Url {
        self.url.borrow().clone()
    }

    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn load_status(&self) -> LoadStatus {
        if self.loading.get() {
            LoadStatus::Loading
        } else {
            LoadStatus::Complete
        }
    }

    fn is_audible(&self) -> bool {
        self.audible.get()
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }

    fn is_private(&self) -> bool {
        self.private.get()
    }

    fn process_ref(&self) -> (ProcessId, RoutingId) {
        self.process_ref.get()
    }

    fn frames(&self) -> Vec<RoutingId> {
        self.frames.borrow().clone()
    }

    fn send_to_frame(&self, frame: RoutingId, message: FrameMessage) {
        self.sent.borrow_mut().push((frame, message));
    }
}

#[derive(Default)]
pub struct MockDispatcher {
    pub injections: RefCell<Vec<ScriptInjection>>,
}

impl MockDispatcher {
    pub fn new() -> Rc<MockDispatcher> {
        Rc::new(MockDispatcher::default())
    }
}

impl ScriptDispatcher for MockDispatcher {
    fn dispatch(&self, injection: ScriptInjection) {
        self.injections.borrow_mut().push(injection);
    }
}

pub struct MockSiteInstance {
    pub url: Url,
    pub process: Cell<Option<ProcessId>>,
}

impl MockSiteInstance {
    pub fn new(spec: &str, process: Option<ProcessId>) -> Rc<MockSiteInstance> {
        Rc::new(MockSiteInstance {
            url: url(spec),
            process: Cell::new(process),
        })
    }
}

impl SiteInstance for MockSiteInstance {
    fn site_url(&self) -> Url {
        self.url.clone()
    }

    fn process(&self) -> Option<ProcessId> {
        self.process.get()
    }
}

/// Creates site instances and assigns each a fresh process id, mimicking an
/// embedder that launches a new process per instance.
pub struct MockSiteInstanceFactory {
    pub next_process: Cell<i32>,
    pub created: RefCell<Vec<Rc<MockSiteInstance>>>,
}

impl MockSiteInstanceFactory {
    pub fn new(first_process: i32) -> Rc<MockSiteInstanceFactory> {
        Rc::new(MockSiteInstanceFactory {
            next_process: Cell::new(first_process),
            created: RefCell::new(Vec::new()),
        })
    }
}

impl SiteInstanceFactory for MockSiteInstanceFactory {
    fn create_for_url(
        &self,
        _browsing_context: BrowsingContextId,
        url: &Url,
    ) -> Rc<dyn SiteInstance> {
        let process = ProcessId(self.next_process.get());
        self.next_process.set(process.value() + 1);
        let instance = MockSiteInstance::new(url.as_str(), Some(process));
        self.created.borrow_mut().push(instance.clone());
        instance
    }
}

#[derive(Default)]
pub struct MockProcessRegistry {
    pub live: RefCell<HashSet<ProcessId>>,
    pub watched: RefCell<Vec<ProcessId>>,
}

impl MockProcessRegistry {
    pub fn new() -> Rc<MockProcessRegistry> {
        Rc::new(MockProcessRegistry::default())
    }

    pub fn set_live(&self, process: ProcessId) {
        self.live.borrow_mut().insert(process);
    }

    pub fn kill(&self, process: ProcessId) {
        self.live.borrow_mut().remove(&process);
    }
}

impl ProcessRegistry for MockProcessRegistry {
    fn is_live(&self, process: ProcessId) -> bool {
        self.live.borrow().contains(&process)
    }

    fn watch_termination(&self, process: ProcessId) {
        self.watched.borrow_mut().push(process);
    }
}

#[derive(Default)]
pub struct MockContainerRegistry {
    pub by_process: RefCell<HashMap<ProcessId, Rc<dyn ContentContainer>>>,
    pub by_routing: RefCell<HashMap<(ProcessId, RoutingId), Rc<dyn ContentContainer>>>,
}

impl MockContainerRegistry {
    pub fn new() -> Rc<MockContainerRegistry> {
        Rc::new(MockContainerRegistry::default())
    }

    pub fn insert(&self, container: &Rc<MockContainer>) {
        let (process, routing) = container.process_ref.get();
        let container: Rc<dyn ContentContainer> = container.clone();
        self.by_process
            .borrow_mut()
            .insert(process, container.clone());
        self.by_routing
            .borrow_mut()
            .insert((process, routing), container);
    }
}

impl ContainerRegistry for MockContainerRegistry {
    fn container_by_process(&self, process: ProcessId) -> Option<Rc<dyn ContentContainer>> {
        self.by_process.borrow().get(&process).cloned()
    }

    fn container_by_routing(
        &self,
        process: ProcessId,
        routing: RoutingId,
    ) -> Option<Rc<dyn ContentContainer>> {
        self.by_routing.borrow().get(&(process, routing)).cloned()
    }
}

/// An extension policy whose answers are scripted per test.
#[derive(Default)]
pub struct MockExtensionPolicy {
    pub navigation: Option<ExtensionPolicyDecision>,
    pub allow_open_url: Option<bool>,
    pub process_per_site: Option<bool>,
    pub swap_browsing_instances: Option<bool>,
}

impl ExtensionPolicyOracle for MockExtensionPolicy {
    fn override_navigation(
        &self,
        _current_instance: &dyn SiteInstance,
        _from_url: &Url,
        _to_url: &Url,
    ) -> Option<ExtensionPolicyDecision> {
        self.navigation
    }

    fn should_allow_open_url(
        &self,
        _site_instance: &dyn SiteInstance,
        _from_url: &Url,
        _url: &Url,
    ) -> Option<bool> {
        self.allow_open_url
    }

    fn should_use_process_per_site(
        &self,
        _browsing_context: BrowsingContextId,
        _effective_url: &Url,
    ) -> Option<bool> {
        self.process_per_site
    }

    fn should_swap_browsing_instances(
        &self,
        _site_instance: &dyn SiteInstance,
        _current_url: &Url,
        _new_url: &Url,
    ) -> Option<bool> {
        self.swap_browsing_instances
    }
}

pub struct DenyAllWindows;

impl WindowOpenDelegate for DenyAllWindows {
    fn can_create_window(&self, _request: &NavigationRequest) -> bool {
        false
    }
}

/// Records every runtime hook invocation in order.
#[derive(Default)]
pub struct MockScriptRuntime {
    pub events: Rc<RefCell<Vec<String>>>,
    /// When set, `create_environment` reports failure.
    pub fail_creation: bool,
}

impl MockScriptRuntime {
    fn record(&self, event: &str) {
        self.events.borrow_mut().push(event.to_owned());
    }
}

impl ScriptRuntime for MockScriptRuntime {
    fn create_environment(&mut self) -> Result<(), ExternalFailure> {
        self.record("create_environment");
        if self.fail_creation {
            return Err(ExternalFailure(String::from("environment creation failed")));
        }
        Ok(())
    }

    fn enter_context(&mut self) {
        self.record("enter_context");
    }

    fn exit_context(&mut self) {
        self.record("exit_context");
    }

    fn load_environment(&mut self) {
        self.record("load_environment");
    }

    fn on_message_loop_created(&mut self) {
        self.record("on_message_loop_created");
    }

    fn on_message_loop_destroying(&mut self) {
        self.record("on_message_loop_destroying");
    }

    fn idle_notification(&mut self) {
        self.record("idle_notification");
    }

    fn low_memory_notification(&mut self) {
        self.record("low_memory_notification");
    }
}

/// The collaborators behind a test coordinator.
pub struct TestHarness {
    pub coordinator: SessionCoordinator,
    pub message_loop: MessageLoop,
    pub factory: Rc<MockSiteInstanceFactory>,
    pub processes: Rc<MockProcessRegistry>,
    pub containers: Rc<MockContainerRegistry>,
}

pub fn harness() -> TestHarness {
    harness_with_policy(None)
}

pub fn harness_with_policy(policy: Option<Rc<dyn ExtensionPolicyOracle>>) -> TestHarness {
    let message_loop = MessageLoop::new();
    let factory = MockSiteInstanceFactory::new(100);
    let processes = MockProcessRegistry::new();
    let containers = MockContainerRegistry::new();
    let coordinator = SessionCoordinator::new(InitialCoordinatorState {
        site_instance_factory: factory.clone(),
        process_registry: processes.clone(),
        container_registry: containers.clone(),
        extension_policy: policy,
        local_task_sender: message_loop.local_sender(),
    });
    TestHarness {
        coordinator,
        message_loop,
        factory,
        processes,
        containers,
    }
}
