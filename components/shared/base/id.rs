/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Identifiers for browsing sessions, windows, processes and routing
//! endpoints.
//!
//! These are plain newtypes: allocation policy lives with whoever owns the
//! relevant table. In particular `SessionId`s are handed out by the
//! coordinator's identity allocator and are never recycled for the lifetime
//! of the browser process.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        pub struct $name(pub $inner);

        impl $name {
            pub fn value(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

id_type! {
    /// The stable numeric identity assigned to a tab for the rest of its
    /// lifetime. Strictly increasing from 1, never reused.
    SessionId(i32)
}

id_type! {
    /// Identifies a top-level window. Supplied by the embedder when a tab is
    /// attached to a window.
    WindowId(i32)
}

id_type! {
    /// Identifies an operating-system render process.
    ProcessId(i32)
}

id_type! {
    /// Identifies a routing endpoint (a view or frame) inside a render
    /// process.
    RoutingId(i32)
}

id_type! {
    /// An opaque handle to a browsing context, supplied by the embedder.
    BrowsingContextId(u32)
}

impl SessionId {
    /// The first session id handed out by a fresh allocator.
    pub const FIRST: SessionId = SessionId(1);
}
