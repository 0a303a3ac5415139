// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

//! Fixed-capacity, pool-allocated, single-producer/single-consumer typed
//! ring buffers. Grounded on `lib/types/queue.c`/`queue.h`/`queue_types.h`.
//!
//! Two flavors are offered, matching the two call sites the original serves:
//! [`TypedRing`] is a generic ring over a statically-known element type,
//! used directly by the transport drivers; [`RingPool`] is the dynamic,
//! tag-dispatched pool (`QueueDataType`) an application populates at
//! runtime, the way `queue_create` accepted a `dataType` argument.

mod element;
mod typed;

pub use element::{ElementKind, ElementQueue, RingHandle, RingPool};
pub use typed::TypedRing;

/// Draw order: FIFO takes from the tail (insertion order); LIFO takes from
/// the head (most recently added first). Mirrors `QueueType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingMode {
    Fifo,
    Lifo,
}
