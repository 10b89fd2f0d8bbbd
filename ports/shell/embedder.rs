/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A minimal in-process embedder. Everything the coordinator expects from an
//! embedder is simulated in memory: "processes" are ids handed out by the
//! site-instance factory, frames are logged instead of messaged, and the
//! script runtime only reports its lifecycle hooks.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use base::id::{BrowsingContextId, ProcessId, RoutingId};
use browser_traits::{
    ContainerRegistry, ContentContainer, ExternalFailure, FrameMessage, LoadStatus,
    ProcessRegistry, ScriptDispatcher, ScriptInjection, ScriptRuntime, SiteInstance,
    SiteInstanceFactory,
};
use log::{debug, info};
use url::Url;

/// Stands in for a script engine. Each hook logs so the startup and shutdown
/// order is visible with `RUST_LOG=debug`.
pub struct ShellScriptRuntime;

impl ScriptRuntime for ShellScriptRuntime {
    fn create_environment(&mut self) -> Result<(), ExternalFailure> {
        debug!("Script runtime: environment created.");
        Ok(())
    }

    fn enter_context(&mut self) {
        debug!("Script runtime: context entered.");
    }

    fn exit_context(&mut self) {
        debug!("Script runtime: context exited.");
    }

    fn load_environment(&mut self) {
        debug!("Script runtime: environment loaded.");
    }

    fn on_message_loop_created(&mut self) {
        debug!("Script runtime: message loop created.");
    }

    fn on_message_loop_destroying(&mut self) {
        debug!("Script runtime: message loop destroying.");
    }

    fn idle_notification(&mut self) {
        debug!("Script runtime: idle notification.");
    }

    fn low_memory_notification(&mut self) {
        debug!("Script runtime: low memory notification.");
    }
}

pub struct ShellSiteInstance {
    url: Url,
    process: Option<ProcessId>,
}

impl SiteInstance for ShellSiteInstance {
    fn site_url(&self) -> Url {
        self.url.clone()
    }

    fn process(&self) -> Option<ProcessId> {
        self.process
    }
}

/// Hands out a fresh simulated process for every site instance and marks it
/// live in the shared registry.
pub struct ShellSiteInstanceFactory {
    next_process: Cell<i32>,
    processes: Rc<ShellProcessRegistry>,
}

impl ShellSiteInstanceFactory {
    pub fn new(processes: Rc<ShellProcessRegistry>) -> Rc<ShellSiteInstanceFactory> {
        Rc::new(ShellSiteInstanceFactory {
            next_process: Cell::new(1),
            processes,
        })
    }
}

impl SiteInstanceFactory for ShellSiteInstanceFactory {
    fn create_for_url(
        &self,
        _browsing_context: BrowsingContextId,
        url: &Url,
    ) -> Rc<dyn SiteInstance> {
        let process = ProcessId(self.next_process.get());
        self.next_process.set(process.value() + 1);
        self.processes.spawn(process);
        info!("Spawned process {} for {}.", process, url);
        Rc::new(ShellSiteInstance {
            url: url.clone(),
            process: Some(process),
        })
    }
}

#[derive(Default)]
pub struct ShellProcessRegistry {
    live: RefCell<HashSet<ProcessId>>,
}

impl ShellProcessRegistry {
    pub fn new() -> Rc<ShellProcessRegistry> {
        Rc::new(ShellProcessRegistry::default())
    }

    pub fn spawn(&self, process: ProcessId) {
        self.live.borrow_mut().insert(process);
    }
}

impl ProcessRegistry for ShellProcessRegistry {
    fn is_live(&self, process: ProcessId) -> bool {
        self.live.borrow().contains(&process)
    }

    fn watch_termination(&self, process: ProcessId) {
        debug!("Watching process {} for termination.", process);
    }
}

/// A single-frame page. Frame messages are logged rather than delivered,
/// since there is no renderer on the other end.
pub struct ShellContainer {
    url: RefCell<Url>,
    title: RefCell<String>,
    process_ref: Cell<(ProcessId, RoutingId)>,
}

impl ShellContainer {
    pub fn new(url: Url, process: ProcessId, routing: RoutingId) -> Rc<ShellContainer> {
        Rc::new(ShellContainer {
            url: RefCell::new(url),
            title: RefCell::new(String::from("New Tab")),
            process_ref: Cell::new((process, routing)),
        })
    }
}

impl ContentContainer for ShellContainer {
    fn url(&self) -> Url {
        self.url.borrow().clone()
    }

    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn load_status(&self) -> LoadStatus {
        LoadStatus::Complete
    }

    fn is_audible(&self) -> bool {
        false
    }

    fn is_muted(&self) -> bool {
        false
    }

    fn is_private(&self) -> bool {
        false
    }

    fn process_ref(&self) -> (ProcessId, RoutingId) {
        self.process_ref.get()
    }

    fn frames(&self) -> Vec<RoutingId> {
        vec![self.process_ref.get().1]
    }

    fn send_to_frame(&self, frame: RoutingId, message: FrameMessage) {
        debug!("Frame {} <- {:?}", frame, message);
    }
}

#[derive(Default)]
pub struct ShellContainerRegistry {
    by_routing: RefCell<HashMap<(ProcessId, RoutingId), Rc<dyn ContentContainer>>>,
}

impl ShellContainerRegistry {
    pub fn new() -> Rc<ShellContainerRegistry> {
        Rc::new(ShellContainerRegistry::default())
    }

    pub fn register(&self, container: &Rc<ShellContainer>) {
        let key = container.process_ref.get();
        self.by_routing
            .borrow_mut()
            .insert(key, container.clone() as Rc<dyn ContentContainer>);
    }
}

impl ContainerRegistry for ShellContainerRegistry {
    fn container_by_process(&self, process: ProcessId) -> Option<Rc<dyn ContentContainer>> {
        self.by_routing
            .borrow()
            .iter()
            .find(|((p, _), _)| *p == process)
            .map(|(_, container)| container.clone())
    }

    fn container_by_routing(
        &self,
        process: ProcessId,
        routing: RoutingId,
    ) -> Option<Rc<dyn ContentContainer>> {
        self.by_routing.borrow().get(&(process, routing)).cloned()
    }
}

pub struct ShellDispatcher;

impl ScriptDispatcher for ShellDispatcher {
    fn dispatch(&self, injection: ScriptInjection) {
        info!(
            "Would inject {} byte(s) of script (all_frames: {}).",
            injection.code.len(),
            injection.all_frames
        );
    }
}
