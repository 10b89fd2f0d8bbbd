/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! A crate to hold the very common identity types in lattice.
//!
//! You should almost never need to add a data type to this crate. Instead
//! look for a more specific shared crate that has fewer dependents.

pub mod id;
