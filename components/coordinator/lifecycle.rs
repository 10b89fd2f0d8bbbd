/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The ordered startup/shutdown sequence of the browser process, and the
//! registry of shutdown callbacks that must run before the event loop and
//! its dependent subsystems are torn down.
//!
//! There is exactly one `LifecycleCoordinator` per process. It is the first
//! thing constructed and the last thing torn down; constructing a second
//! while one exists is a programming error, not a recoverable condition.

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use browser_traits::{ExternalFailure, MemoryPressureLevel, ScriptRuntime};
use log::{debug, warn};

use crate::message_loop::{LocalTaskSender, MessageLoop, TaskSender};

static LIFECYCLE_EXISTS: AtomicBool = AtomicBool::new(false);

/// Idle garbage collection runs on this fixed interval.
const IDLE_GC_INTERVAL: Duration = Duration::from_secs(60);

/// The startup phases, in order. Each is a hard prerequisite for the next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StartupPhase {
    Created,
    PreThread,
    PreMessageLoop,
    LoopRunning,
    PostMessageLoop,
}

/// A shutdown callback waiting to run.
struct DestructorSlot {
    id: u64,
    /// Taken when the callback runs or is cancelled. The slot itself is
    /// never removed, so positions stay stable while the list is iterated.
    callback: Option<Box<dyn FnOnce()>>,
}

#[derive(Default)]
struct DestructorList {
    slots: Vec<DestructorSlot>,
    next_id: u64,
}

impl DestructorList {
    fn register(&mut self, callback: Box<dyn FnOnce()>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push(DestructorSlot {
            id,
            callback: Some(callback),
        });
        id
    }

    fn cancel(&mut self, id: u64) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.id == id) {
            // Already run or already cancelled is a no-op.
            slot.callback = None;
        }
    }
}

/// Cancels the shutdown callback it was returned for. Cancelling twice, or
/// cancelling a callback that has already run, is a no-op.
pub struct DestructionHandle {
    id: u64,
    list: Weak<RefCell<DestructorList>>,
}

impl DestructionHandle {
    pub fn cancel(&self) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().cancel(self.id);
        }
    }
}

/// Owns the message loop, the script runtime and the shutdown-callback
/// registry, and drives the fixed startup sequence:
///
/// 1. `pre_create_threads` — process-wide services, before any worker thread.
/// 2. `pre_main_message_loop_run` — script environment and bindings.
/// 3. `run_main_message_loop` — hand control to the event loop.
/// 4. `post_main_message_loop_run` — shutdown callbacks, then teardown.
pub struct LifecycleCoordinator {
    phase: StartupPhase,
    message_loop: MessageLoop,
    script_runtime: Option<Rc<RefCell<dyn ScriptRuntime>>>,
    destructors: Rc<RefCell<DestructorList>>,
    shutting_down: bool,
}

impl LifecycleCoordinator {
    pub fn new(script_runtime: Option<Rc<RefCell<dyn ScriptRuntime>>>) -> LifecycleCoordinator {
        assert!(
            !LIFECYCLE_EXISTS.swap(true, Ordering::SeqCst),
            "Cannot have two LifecycleCoordinators in one process"
        );
        LifecycleCoordinator {
            phase: StartupPhase::Created,
            message_loop: MessageLoop::new(),
            script_runtime,
            destructors: Rc::new(RefCell::new(DestructorList::default())),
            shutting_down: false,
        }
    }

    fn advance(&mut self, expected: StartupPhase, next: StartupPhase) {
        assert!(
            self.phase == expected,
            "Startup phase out of order: expected {:?}, currently {:?}",
            expected,
            self.phase
        );
        self.phase = next;
    }

    /// Phase 1: initialize process-wide services that must exist before any
    /// worker thread starts.
    pub fn pre_create_threads(&mut self) {
        self.advance(StartupPhase::Created, StartupPhase::PreThread);
        debug!("Lifecycle: pre-thread phase complete.");
    }

    /// Phase 2: construct the script-engine environment and bindings, load
    /// the runtime, and schedule idle garbage collection.
    pub fn pre_main_message_loop_run(&mut self) -> Result<(), ExternalFailure> {
        self.advance(StartupPhase::PreThread, StartupPhase::PreMessageLoop);
        if let Some(runtime) = &self.script_runtime {
            {
                let mut runtime = runtime.borrow_mut();
                runtime.create_environment()?;
                runtime.enter_context();
                runtime.load_environment();
                runtime.on_message_loop_created();
            }
            let gc_runtime = runtime.clone();
            self.message_loop.add_repeating_task(
                IDLE_GC_INTERVAL,
                Box::new(move || gc_runtime.borrow_mut().idle_notification()),
            );
        }
        debug!("Lifecycle: pre-message-loop phase complete.");
        Ok(())
    }

    /// Phase 3: hand control to the event loop. Returns the exit code once
    /// the loop is asked to quit.
    pub fn run_main_message_loop(&mut self) -> i32 {
        self.advance(StartupPhase::PreMessageLoop, StartupPhase::LoopRunning);
        self.message_loop.run()
    }

    /// Phase 4: run every registered shutdown callback in registration
    /// order, with the loop still alive, then release the script engine.
    pub fn post_main_message_loop_run(&mut self) {
        self.advance(StartupPhase::LoopRunning, StartupPhase::PostMessageLoop);
        self.shutting_down = true;

        if let Some(runtime) = &self.script_runtime {
            let mut runtime = runtime.borrow_mut();
            runtime.on_message_loop_destroying();
            runtime.exit_context();
        }

        run_destructors(&self.destructors);

        // Leak the script environment instead of tearing it down: the engine
        // may be waiting on background work that never finishes, and the
        // process is exiting anyway. Everything that matters was already
        // cleaned up by the destructor callbacks.
        if let Some(runtime) = self.script_runtime.take() {
            mem::forget(runtime);
        }
        debug!("Lifecycle: post-message-loop phase complete.");
    }

    /// Register a callback to run during phase 4 unless cancelled first via
    /// the returned handle. Callbacks run exactly once, in registration
    /// order.
    pub fn register_destruction_callback(
        &mut self,
        callback: Box<dyn FnOnce()>,
    ) -> DestructionHandle {
        let id = self.destructors.borrow_mut().register(callback);
        DestructionHandle {
            id,
            list: Rc::downgrade(&self.destructors),
        }
    }

    /// Store the process exit code. Succeeds only once the message loop has
    /// a result-code destination; otherwise fails silently and the exit code
    /// stays 0.
    pub fn set_exit_code(&mut self, code: i32) -> bool {
        self.message_loop.set_result_code(code)
    }

    pub fn exit_code(&self) -> i32 {
        self.message_loop.result_code()
    }

    /// The platform reported memory pressure: release free memory and notify
    /// the script engine, unless shutdown has already begun.
    pub fn on_memory_pressure(&mut self, level: MemoryPressureLevel) {
        if self.shutting_down {
            return;
        }
        debug!("Memory pressure ({:?}).", level);
        if let Some(runtime) = &self.script_runtime {
            runtime.borrow_mut().low_memory_notification();
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// A handle for posting tasks to the coordinator thread.
    pub fn task_sender(&self) -> TaskSender {
        self.message_loop.sender()
    }

    /// A handle for deferring work on the coordinator thread itself.
    pub fn local_task_sender(&self) -> LocalTaskSender {
        self.message_loop.local_sender()
    }

    /// Drain tasks already queued without blocking. Used between phases and
    /// by embedders that interleave the loop with their own.
    pub fn run_pending_tasks(&mut self) -> usize {
        self.message_loop.run_pending_tasks()
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        if self.phase != StartupPhase::PostMessageLoop && self.phase != StartupPhase::Created {
            warn!("LifecycleCoordinator dropped in phase {:?}.", self.phase);
        }
        LIFECYCLE_EXISTS.store(false, Ordering::SeqCst);
    }
}

/// Run every registered callback in registration order. Callbacks may
/// register or cancel other callbacks while this runs, so the list is walked
/// by stable index with the borrow released around each call.
fn run_destructors(destructors: &Rc<RefCell<DestructorList>>) {
    let mut index = 0;
    loop {
        let callback = {
            let mut list = destructors.borrow_mut();
            if index >= list.slots.len() {
                break;
            }
            let callback = list.slots[index].callback.take();
            index += 1;
            callback
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}
