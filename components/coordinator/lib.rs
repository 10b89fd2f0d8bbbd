/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! The multi-process browsing-session coordinator.
//!
//! This crate decides, for every navigation and every tab, which render
//! process executes the resulting page; tracks the bookkeeping needed to
//! redirect lookups to the right process while a speculative navigation is
//! in flight; assigns stable session identities to tabs; and runs the fixed
//! startup/shutdown sequence of the process that owns all of this state.

mod coordinator;
mod identity;
mod lifecycle;
mod message_loop;
mod pending;
mod policy;
mod tab_session;

pub use crate::coordinator::{InitialCoordinatorState, SessionCoordinator};
pub use crate::identity::IdentityAllocator;
pub use crate::lifecycle::{DestructionHandle, LifecycleCoordinator};
pub use crate::message_loop::{LocalTask, LocalTaskSender, MessageLoop, Task, TaskSender};
pub use crate::pending::PendingProcessTable;
pub use crate::policy::{NavigationOutcome, ProcessAssignmentPolicy};
pub use crate::tab_session::{keys, TabSession};
