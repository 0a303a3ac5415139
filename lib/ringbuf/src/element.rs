// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::RingMode;
use num_derive::{FromPrimitive, ToPrimitive};
use zerocopy::{AsBytes, FromBytes};

/// Element width/representation tag, mirroring `QueueDataType`'s
/// preprocessor-generated type table (`QUEUE_DEFAULT_TYPE_TABLE`). A caller
/// that needs a type not listed here should reach for the generic
/// [`crate::TypedRing`] instead — the equivalent of the original's
/// `QUEUE_GLOBAL_CUSTOM_TYPE_TABLE` escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementKind {
    pub const fn width(self) -> usize {
        match self {
            ElementKind::U8 | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::U64 | ElementKind::I64 | ElementKind::F64 => 8,
        }
    }
}

/// Handle into a [`RingPool`], returned by [`RingPool::create`]. Opaque:
/// callers never dereference the index themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingHandle(usize);

/// One claimed queue: a byte-addressed backing buffer interpreted in
/// `kind`-wide elements, with `head`/`tail` counted in elements (not
/// bytes), exactly as `struct Queue` tracks them in the original.
pub struct ElementQueue<'a> {
    buffer: &'a mut [u8],
    length: usize,
    head: usize,
    tail: usize,
    mode: RingMode,
    kind: ElementKind,
}

impl<'a> ElementQueue<'a> {
    fn create(buffer: &'a mut [u8], length: usize, mode: RingMode, kind: ElementKind) -> Option<Self> {
        if buffer.is_empty() || length == 0 || buffer.len() < length * kind.width() {
            return None;
        }
        Some(ElementQueue {
            buffer,
            length,
            head: 0,
            tail: 0,
            mode,
            kind,
        })
    }

    fn elem(&self, index: usize) -> &[u8] {
        let w = self.kind.width();
        &self.buffer[index * w..index * w + w]
    }

    fn elem_mut(&mut self, index: usize) -> &mut [u8] {
        let w = self.kind.width();
        &mut self.buffer[index * w..index * w + w]
    }

    /// Writes `value`'s bytes into the next slot. `value.len()` must equal
    /// this queue's element width.
    pub fn add_bytes(&mut self, value: &[u8]) -> bool {
        debug_assert_eq!(value.len(), self.kind.width());
        let next = (self.head + 1) % self.length;
        if next == self.tail {
            return false;
        }
        self.elem_mut(self.head).copy_from_slice(value);
        self.head = next;
        true
    }

    /// Typed convenience wrapper over [`Self::add_bytes`].
    pub fn add<T: AsBytes>(&mut self, value: &T) -> bool {
        self.add_bytes(value.as_bytes())
    }

    /// Reads the next element's bytes into `out` per this queue's mode.
    /// `out.len()` must equal this queue's element width.
    pub fn take_bytes(&mut self, out: &mut [u8]) -> bool {
        debug_assert_eq!(out.len(), self.kind.width());
        match self.mode {
            RingMode::Fifo => self.take_back(out),
            RingMode::Lifo => self.take_front(out),
        }
    }

    /// Typed convenience wrapper over [`Self::take_bytes`].
    pub fn take<T: FromBytes>(&mut self) -> Option<T> {
        let mut scratch = [0u8; 8];
        let w = self.kind.width();
        if !self.take_bytes(&mut scratch[..w]) {
            return None;
        }
        T::read_from(&scratch[..w])
    }

    fn take_back(&mut self, out: &mut [u8]) -> bool {
        if self.head == self.tail {
            return false;
        }
        out.copy_from_slice(self.elem(self.tail));
        self.tail = (self.tail + 1) % self.length;
        true
    }

    fn take_front(&mut self, out: &mut [u8]) -> bool {
        if self.head == self.tail {
            return false;
        }
        self.head = if self.head > 0 {
            self.head - 1
        } else {
            self.length - 1
        };
        out.copy_from_slice(self.elem(self.head));
        true
    }

    pub fn flush(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.head + 1) % self.length == self.tail
    }
}

struct Slot<'a> {
    queue: Option<ElementQueue<'a>>,
}

/// Fixed-size pool of `N` dynamic, tag-dispatched queues, the direct
/// counterpart of the original's file-scope `queuePool[QUEUE_POOL_SIZE]`.
pub struct RingPool<'a, const N: usize> {
    slots: [Slot<'a>; N],
}

impl<'a, const N: usize> RingPool<'a, N> {
    pub fn new() -> Self {
        RingPool {
            slots: core::array::from_fn(|_| Slot { queue: None }),
        }
    }

    /// Invalidates every queue in the pool. Must be called before any
    /// `create`.
    pub fn init(&mut self) {
        for slot in &mut self.slots {
            slot.queue = None;
        }
    }

    pub fn create(
        &mut self,
        buffer: &'a mut [u8],
        length: usize,
        mode: RingMode,
        kind: ElementKind,
    ) -> Option<RingHandle> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.queue.is_none() {
                let queue = ElementQueue::create(buffer, length, mode, kind)?;
                slot.queue = Some(queue);
                return Some(RingHandle(i));
            }
        }
        None
    }

    pub fn invalidate(&mut self, handle: RingHandle) {
        self.slots[handle.0].queue = None;
    }

    pub fn add<T: AsBytes>(&mut self, handle: RingHandle, value: &T) -> bool {
        self.queue_mut(handle).map_or(false, |q| q.add(value))
    }

    pub fn take<T: FromBytes>(&mut self, handle: RingHandle) -> Option<T> {
        self.queue_mut(handle).and_then(|q| q.take())
    }

    pub fn flush(&mut self, handle: RingHandle) {
        if let Some(q) = self.queue_mut(handle) {
            q.flush();
        }
    }

    pub fn is_empty(&self, handle: RingHandle) -> bool {
        self.queue(handle).map_or(true, |q| q.is_empty())
    }

    pub fn is_full(&self, handle: RingHandle) -> bool {
        self.queue(handle).map_or(false, |q| q.is_full())
    }

    pub fn is_valid(&self, handle: RingHandle) -> bool {
        self.queue(handle).is_some()
    }

    fn queue(&self, handle: RingHandle) -> Option<&ElementQueue<'a>> {
        self.slots.get(handle.0).and_then(|s| s.queue.as_ref())
    }

    fn queue_mut(&mut self, handle: RingHandle) -> Option<&mut ElementQueue<'a>> {
        self.slots.get_mut(handle.0).and_then(|s| s.queue.as_mut())
    }
}

impl<'a, const N: usize> Default for RingPool<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_undersized_buffer() {
        let mut pool: RingPool<4> = RingPool::new();
        let mut buf = [0u8; 2];
        assert!(pool.create(&mut buf, 4, RingMode::Fifo, ElementKind::U32).is_none());
    }

    #[test]
    fn fifo_roundtrip_through_pool() {
        let mut pool: RingPool<4> = RingPool::new();
        let mut buf = [0u8; 16]; // 4 u32 slots
        let handle = pool
            .create(&mut buf, 4, RingMode::Fifo, ElementKind::U32)
            .unwrap();
        assert!(pool.add(handle, &10u32));
        assert!(pool.add(handle, &20u32));
        assert_eq!(pool.take::<u32>(handle), Some(10));
        assert_eq!(pool.take::<u32>(handle), Some(20));
        assert!(pool.is_empty(handle));
    }

    #[test]
    fn full_and_flush() {
        let mut pool: RingPool<4> = RingPool::new();
        let mut buf = [0u8; 4]; // 4 u8 slots, capacity 3
        let handle = pool
            .create(&mut buf, 4, RingMode::Fifo, ElementKind::U8)
            .unwrap();
        assert!(pool.add(handle, &1u8));
        assert!(pool.add(handle, &2u8));
        assert!(pool.add(handle, &3u8));
        assert!(pool.is_full(handle));
        assert!(!pool.add(handle, &4u8));
        pool.flush(handle);
        assert!(pool.is_empty(handle));
    }

    #[test]
    fn invalidate_makes_handle_unusable() {
        let mut pool: RingPool<4> = RingPool::new();
        let mut buf = [0u8; 16];
        let handle = pool
            .create(&mut buf, 4, RingMode::Fifo, ElementKind::U32)
            .unwrap();
        pool.invalidate(handle);
        assert!(!pool.is_valid(handle));
        assert!(!pool.add(handle, &1u32));
    }
}
