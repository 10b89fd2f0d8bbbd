/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The coordinator's event loop.
//!
//! One logical thread owns all browsing-session state. Everything else
//! reaches that state by posting tasks through a [`TaskSender`]; the loop
//! runs them to completion one at a time, so no partial state is ever
//! observable. Repeating tasks (the idle-GC tick, for example) are scheduled
//! by deadline between messages.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::warn;

/// A unit of work for the coordinator thread, posted from any thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work queued from the coordinator thread itself, to run after
/// the current task completes. Not required to be `Send`.
pub type LocalTask = Box<dyn FnOnce() + 'static>;

enum LoopMessage {
    Task(Task),
    Quit,
}

/// A handle for posting tasks to the message loop. Cheap to clone, and
/// `Send`: this is how other threads reach the coordinator thread.
pub struct TaskSender {
    sender: Sender<LoopMessage>,
}

impl Clone for TaskSender {
    fn clone(&self) -> TaskSender {
        TaskSender {
            sender: self.sender.clone(),
        }
    }
}

impl TaskSender {
    pub fn post(&self, task: Task) {
        if self.sender.send(LoopMessage::Task(task)).is_err() {
            warn!("Posting a task to a message loop that has gone away.");
        }
    }

    /// Ask the loop to stop after the tasks already queued.
    pub fn quit(&self) {
        if self.sender.send(LoopMessage::Quit).is_err() {
            warn!("Quitting a message loop that has gone away.");
        }
    }
}

/// A handle for deferring work on the loop's own thread. The queued task
/// runs once the task currently executing completes. Unlike [`TaskSender`]
/// this holds the queue directly and never crosses threads.
pub struct LocalTaskSender {
    queue: Rc<RefCell<VecDeque<LocalTask>>>,
}

impl Clone for LocalTaskSender {
    fn clone(&self) -> LocalTaskSender {
        LocalTaskSender {
            queue: self.queue.clone(),
        }
    }
}

impl LocalTaskSender {
    pub fn post(&self, task: LocalTask) {
        self.queue.borrow_mut().push_back(task);
    }
}

struct RepeatingTask {
    interval: Duration,
    next_fire: Instant,
    task: Box<dyn FnMut()>,
}

/// The event loop itself. Owned by the lifecycle coordinator; lives from
/// before the first startup phase until after the last shutdown callback has
/// run.
pub struct MessageLoop {
    sender: Sender<LoopMessage>,
    receiver: Receiver<LoopMessage>,
    local: Rc<RefCell<VecDeque<LocalTask>>>,
    repeating: Vec<RepeatingTask>,

    /// The result-code destination. Installed when the loop first runs;
    /// `set_result_code` fails until then.
    result_code: Option<i32>,
}

impl MessageLoop {
    pub fn new() -> MessageLoop {
        let (sender, receiver) = unbounded();
        MessageLoop {
            sender,
            receiver,
            local: Rc::new(RefCell::new(VecDeque::new())),
            repeating: Vec::new(),
            result_code: None,
        }
    }

    pub fn sender(&self) -> TaskSender {
        TaskSender {
            sender: self.sender.clone(),
        }
    }

    pub fn local_sender(&self) -> LocalTaskSender {
        LocalTaskSender {
            queue: self.local.clone(),
        }
    }

    /// Schedule `task` to run every `interval` while the loop is running.
    pub fn add_repeating_task(&mut self, interval: Duration, task: Box<dyn FnMut()>) {
        self.repeating.push(RepeatingTask {
            interval,
            next_fire: Instant::now() + interval,
            task,
        });
    }

    /// Whether a result-code destination exists yet.
    pub fn has_result_destination(&self) -> bool {
        self.result_code.is_some()
    }

    /// Store the process exit code. Fails (returning `false`) until the loop
    /// has installed a result-code destination.
    pub fn set_result_code(&mut self, code: i32) -> bool {
        match self.result_code.as_mut() {
            Some(slot) => {
                *slot = code;
                true
            },
            None => false,
        }
    }

    /// The exit code that will be reported. Defaults to 0.
    pub fn result_code(&self) -> i32 {
        self.result_code.unwrap_or(0)
    }

    /// Run until quit is requested, then return the result code.
    pub fn run(&mut self) -> i32 {
        if self.result_code.is_none() {
            self.result_code = Some(0);
        }
        loop {
            self.run_local_tasks();
            let message = match self.next_deadline() {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(timeout) {
                        Ok(message) => Some(message),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                },
                None => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };
            match message {
                Some(LoopMessage::Task(task)) => task(),
                Some(LoopMessage::Quit) => break,
                None => {},
            }
            self.fire_due_repeating_tasks();
        }
        self.result_code()
    }

    /// Run every task already queued, without blocking. Returns the number
    /// of tasks run. Used between startup phases and by tests; a `Quit`
    /// message stops the drain.
    pub fn run_pending_tasks(&mut self) -> usize {
        let mut ran = self.run_local_tasks();
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                LoopMessage::Task(task) => {
                    task();
                    ran += 1;
                    ran += self.run_local_tasks();
                },
                LoopMessage::Quit => break,
            }
        }
        ran
    }

    fn run_local_tasks(&mut self) -> usize {
        let mut ran = 0;
        loop {
            // The borrow is released before the task runs, so tasks may post
            // further local tasks.
            let task = self.local.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                },
                None => break,
            }
        }
        ran
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.repeating.iter().map(|task| task.next_fire).min()
    }

    fn fire_due_repeating_tasks(&mut self) {
        let now = Instant::now();
        for repeating in &mut self.repeating {
            if now >= repeating.next_fire {
                (repeating.task)();
                repeating.next_fire = now + repeating.interval;
            }
        }
    }
}

impl Default for MessageLoop {
    fn default() -> MessageLoop {
        MessageLoop::new()
    }
}
