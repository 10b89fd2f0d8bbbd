/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! A headless shell around the session coordinator. It walks the full
//! browser-process lifecycle once: start the script runtime, open a tab,
//! decide a navigation to the URL given on the command line, print the tab
//! snapshot, then shut down in order.

mod embedder;

use std::cell::RefCell;
use std::rc::Rc;
use std::{env, process};

use base::id::{BrowsingContextId, RoutingId, WindowId};
use browser_traits::{ScriptRuntime, SiteInstanceFactory};
use coordinator::{
    InitialCoordinatorState, LifecycleCoordinator, NavigationOutcome, SessionCoordinator,
};
use embedder::{
    ShellContainer, ShellContainerRegistry, ShellDispatcher, ShellProcessRegistry,
    ShellScriptRuntime, ShellSiteInstanceFactory,
};
use log::{error, info};
use serde_json::Value;
use url::Url;

pub fn main() {
    env_logger::init();

    let argument = env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("https://example.org/"));
    let Ok(target) = Url::parse(&argument) else {
        error!("Not a URL: {}", argument);
        process::exit(2);
    };
    let Ok(blank) = Url::parse("about:blank") else {
        unreachable!("about:blank always parses");
    };

    let runtime: Rc<RefCell<dyn ScriptRuntime>> = Rc::new(RefCell::new(ShellScriptRuntime));
    let mut lifecycle = LifecycleCoordinator::new(Some(runtime));
    lifecycle.pre_create_threads();
    if let Err(failure) = lifecycle.pre_main_message_loop_run() {
        error!("Script environment failed to start: {}", failure);
        process::exit(1);
    }

    let processes = ShellProcessRegistry::new();
    let containers = ShellContainerRegistry::new();
    let factory = ShellSiteInstanceFactory::new(processes.clone());
    let mut sessions = SessionCoordinator::new(InitialCoordinatorState {
        site_instance_factory: factory.clone(),
        process_registry: processes.clone(),
        container_registry: containers.clone(),
        extension_policy: None,
        local_task_sender: lifecycle.local_task_sender(),
    });

    // One window, one tab, starting blank.
    let context = BrowsingContextId(1);
    let instance = factory.create_for_url(context, &blank);
    let Some(host_process) = instance.process() else {
        error!("The shell factory always assigns a process.");
        process::exit(1);
    };
    let container = ShellContainer::new(blank, host_process, RoutingId(1));
    containers.register(&container);
    let session = sessions.create_session(WindowId(1), container, Rc::new(ShellDispatcher));
    sessions.set_active(session, true);

    match sessions.decide_navigation(context, &instance, &target) {
        NavigationOutcome::ReuseCurrentInstance => {
            info!("Navigating to {} in the current process.", target);
        },
        NavigationOutcome::NewInstanceForUrl(new_instance) => {
            info!(
                "Navigating to {} in process {:?}; {} pending entr{}.",
                target,
                new_instance.process(),
                sessions.pending_process_count(),
                if sessions.pending_process_count() == 1 {
                    "y"
                } else {
                    "ies"
                },
            );
        },
        NavigationOutcome::Deferred(decision) => {
            info!("Extension policy took over: {:?}.", decision);
        },
    }

    if let Some(tab) = sessions.tab_value(session) {
        info!("Tab snapshot: {}", Value::Object(tab));
    }

    let _cleanup = lifecycle.register_destruction_callback(Box::new(|| {
        info!("Session state flushed.");
    }));

    // Nothing else to do; leave as soon as queued work is done.
    lifecycle.task_sender().quit();
    let code = lifecycle.run_main_message_loop();
    lifecycle.post_main_message_loop_run();
    process::exit(code);
}
