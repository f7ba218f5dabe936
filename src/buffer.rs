//! Growable byte buffer with read/write cursors, grounded on the original
//! C++ `Buffer` class (prependable/readable/writable regions over one
//! contiguous store).

use std::io::{self, IoSlice, IoSliceMut, Read, Write};

const SPILL_SIZE: usize = 64 * 1024;

/// A contiguous byte store split into three logical regions:
/// `[0, read_pos)` prependable, `[read_pos, write_pos)` readable,
/// `[write_pos, capacity)` writable.
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn readable_bytes(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn writable_bytes(&self) -> usize {
        self.data.len() - self.write_pos
    }

    pub fn prependable_bytes(&self) -> usize {
        self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.readable_bytes() == 0
    }

    /// The readable slice, without consuming it.
    pub fn peek(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Advance the read cursor by `n` bytes (capped at what's readable).
    pub fn retrieve(&mut self, n: usize) {
        let n = n.min(self.readable_bytes());
        self.read_pos += n;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Advance the read cursor up to (and including) `end`, an offset
    /// relative to the start of the readable slice.
    pub fn retrieve_until(&mut self, end: usize) {
        self.retrieve(end);
    }

    /// Drain and return every readable byte, resetting the buffer.
    pub fn retrieve_all(&mut self) -> Vec<u8> {
        let out = self.data[self.read_pos..self.write_pos].to_vec();
        self.read_pos = 0;
        self.write_pos = 0;
        out
    }

    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Append raw bytes, growing/compacting the backing store as needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_writable(bytes.len());
        let start = self.write_pos;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
    }

    fn ensure_writable(&mut self, len: usize) {
        if self.writable_bytes() >= len {
            return;
        }
        if self.writable_bytes() + self.prependable_bytes() >= len {
            // Compact in place: slide the readable region down to offset 0.
            let readable = self.readable_bytes();
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.read_pos = 0;
            self.write_pos = readable;
        } else {
            self.data.resize(self.write_pos + len + 1, 0);
        }
    }

    /// Scatter-read from `fd` into the buffer's writable tail plus a 64 KiB
    /// stack spill, so one syscall can drain large ET-mode bursts without
    /// repeatedly growing the buffer first.
    pub fn read_fd(&mut self, source: &mut impl Read) -> io::Result<usize> {
        let writable = self.writable_bytes();
        let mut spill = [0u8; SPILL_SIZE];

        let n = {
            let tail = &mut self.data[self.write_pos..self.write_pos + writable];
            let mut slices = [IoSliceMut::new(tail), IoSliceMut::new(&mut spill)];
            source.read_vectored(&mut slices)?
        };

        if n <= writable {
            self.write_pos += n;
        } else {
            self.write_pos += writable;
            let spilled = n - writable;
            self.append(&spill[..spilled]);
        }
        Ok(n)
    }

    /// Write the full readable slice to `sink` in one call, advancing the
    /// read cursor by however much was actually written.
    pub fn write_fd(&mut self, sink: &mut impl Write) -> io::Result<usize> {
        let n = sink.write(self.peek())?;
        self.retrieve(n);
        Ok(n)
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an `IoSlice` view over `bytes`, used by callers doing their own
/// vectored writes alongside a `Buffer`'s readable region (see `HttpConn`).
pub fn as_io_slice(bytes: &[u8]) -> IoSlice<'_> {
    IoSlice::new(bytes)
}
