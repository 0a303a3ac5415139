// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![cfg_attr(not(test), no_std)]

//! `PrintStream` redirection contract plus a blocking `puts` shim, grounded
//! on `lib/std/stdstream.h` (`struct StdStream { data, open, close, puts,
//! gets }`) and `peripheral/uart/stream/uart_stream.c` (the one concrete
//! stream the original wires up).
//!
//! Only the stream *contract* lives here — no `printf`-style format string
//! parsing (that is explicitly out of scope; see `SPEC_FULL.md` §1). A
//! transport driver implements [`StreamTransport`] and hands it to
//! [`PrintStream::new`]; anything that formats text (an application's own
//! `core::fmt::Write` consumer, or `write!`/`writeln!` directly against the
//! `PrintStream`) gets a non-blocking-free, spin-until-queued `puts`.

use core::fmt;

/// What a transport must offer to back a [`PrintStream`]: open/close its
/// hardware channel, and accept as many raw bytes as currently fit.
///
/// `transmit_raw` mirrors the transports' own `transmit_raw` contract: it
/// may queue fewer bytes than given and must never block, so all blocking
/// happens in [`PrintStream::puts`]'s retry loop, never inside the
/// transport.
pub trait StreamTransport {
    /// Opens/claims the underlying channel, the `uart_stream_open`
    /// counterpart: claim the channel, configure it, bring it up.
    fn open(&mut self);

    /// Releases the channel, the `uart_stream_close` counterpart.
    fn close(&mut self);

    /// Queues as many of `buffer`'s bytes as currently fit; returns the
    /// count actually queued. Must not be called from interrupt context.
    fn transmit_raw(&self, buffer: &[u8]) -> usize;
}

/// Redirects formatted output to one transport's `puts`. `puts` loops,
/// calling the transport's non-blocking `transmit_raw` until every
/// requested byte has been queued — the same spin `uart_stream_puts` does.
pub struct PrintStream<T: StreamTransport> {
    transport: T,
    open: bool,
}

impl<T: StreamTransport> PrintStream<T> {
    /// Wraps `transport` without opening it yet.
    pub fn new(transport: T) -> Self {
        PrintStream {
            transport,
            open: false,
        }
    }

    /// Opens the underlying transport. Idempotent: calling `open` while
    /// already open is a no-op, since the original's `StdStream.open` has no
    /// defined behavior for a double-open and this port chooses not to
    /// re-claim an already-claimed channel.
    pub fn open(&mut self) {
        if !self.open {
            self.transport.open();
            self.open = true;
        }
    }

    /// Closes the underlying transport. No-op if not open.
    pub fn close(&mut self) {
        if self.open {
            self.transport.close();
            self.open = false;
        }
    }

    /// Writes every byte of `data`, spinning on the transport's
    /// short-count `transmit_raw` until the whole buffer has been queued.
    /// Must not be called from interrupt context; may take arbitrarily
    /// long if nothing drains the transport's TX queue.
    pub fn puts(&self, data: &[u8]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let n = self.transport.transmit_raw(&data[written..]);
            if n == 0 {
                core::hint::spin_loop();
                continue;
            }
            written += n;
        }
        written
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

impl<T: StreamTransport> fmt::Write for PrintStream<T> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::vec::Vec;

    struct MockTransport {
        opened: Cell<bool>,
        // caps how many bytes transmit_raw accepts per call, simulating a
        // small TX FIFO like a real transport's ring buffer.
        cap_per_call: usize,
        sent: RefCell<Vec<u8>>,
    }

    impl StreamTransport for MockTransport {
        fn open(&mut self) {
            self.opened.set(true);
        }
        fn close(&mut self) {
            self.opened.set(false);
        }
        fn transmit_raw(&self, buffer: &[u8]) -> usize {
            let n = buffer.len().min(self.cap_per_call);
            self.sent.borrow_mut().extend_from_slice(&buffer[..n]);
            n
        }
    }

    #[test]
    fn puts_spins_until_all_bytes_queued() {
        let transport = MockTransport {
            opened: Cell::new(false),
            cap_per_call: 3,
            sent: RefCell::new(Vec::new()),
        };
        let stream = PrintStream::new(transport);
        let written = stream.puts(b"hello world");
        assert_eq!(written, 11);
        assert_eq!(stream.transport().sent.borrow().as_slice(), b"hello world");
    }

    #[test]
    fn open_close_are_idempotent() {
        let transport = MockTransport {
            opened: Cell::new(false),
            cap_per_call: 255,
            sent: RefCell::new(Vec::new()),
        };
        let mut stream = PrintStream::new(transport);
        stream.open();
        assert!(stream.is_open());
        stream.open(); // no-op, doesn't panic or re-claim
        assert!(stream.transport().opened.get());

        stream.close();
        assert!(!stream.is_open());
        stream.close(); // no-op
    }

    #[test]
    fn fmt_write_goes_through_puts() {
        use core::fmt::Write;
        let transport = MockTransport {
            opened: Cell::new(false),
            cap_per_call: 255,
            sent: RefCell::new(Vec::new()),
        };
        let mut stream = PrintStream::new(transport);
        write!(&mut stream, "n={}", 7).unwrap();
        assert_eq!(stream.transport().sent.borrow().as_slice(), b"n=7");
    }
}
