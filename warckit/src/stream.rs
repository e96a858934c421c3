// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, BufRead, Read};

/// Default read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;


/// Buffered, offset-tracking input stream with look-ahead.
///
/// Unlike [`std::io::BufReader`], [`ByteSource::peek`] can look further ahead than what
/// happens to be buffered, which makes it possible to sniff magic bytes without
/// consuming them.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    position: u64,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self::with_position(inner, 0, capacity)
    }

    /// Create a source whose first byte is at absolute offset `position`.
    ///
    /// # Arguments
    ///
    /// * `inner` - Underlying reader, already positioned at `position`
    /// * `position` - Absolute offset reported for the first byte
    /// * `capacity` - Initial buffer size
    pub fn with_position(inner: R, position: u64, capacity: usize) -> Self {
        ByteSource {
            inner,
            buf: vec![0; capacity.max(16)],
            start: 0,
            end: 0,
            position,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Look at up to `n` upcoming bytes without consuming them.
    ///
    /// Fewer than `n` bytes are returned only at end of input.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        if self.buffered() < n {
            if self.start > 0 {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            }
            if self.buf.len() < n {
                self.buf.resize(n, 0);
            }
            while self.end < n {
                match self.inner.read(&mut self.buf[self.end..]) {
                    Ok(0) => break,
                    Ok(read) => self.end += read,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        let avail = self.buffered().min(n);
        Ok(&self.buf[self.start..self.start + avail])
    }

    /// Whether no more bytes can be read.
    pub fn is_eof(&mut self) -> io::Result<bool> {
        Ok(self.peek(1)?.is_empty())
    }

    /// Read a single line including its `\n` terminator into `line`.
    ///
    /// At most `limit` bytes are read. Longer lines are returned in pieces.
    /// Returns the number of bytes read, zero at end of input.
    pub fn read_line(&mut self, line: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
        let mut total = 0;
        while total < limit {
            let available = self.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let window = &available[..available.len().min(limit - total)];
            let (n, done) = match window.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (window.len(), false),
            };
            line.extend_from_slice(&window[..n]);
            self.consume(n);
            total += n;
            if done {
                break;
            }
        }
        Ok(total)
    }

    /// Discard up to `n` bytes, returning how many were actually skipped.
    pub fn skip(&mut self, mut n: u64) -> io::Result<u64> {
        let mut skipped = 0;
        while n > 0 {
            let available = self.fill_buf()?;
            if available.is_empty() {
                break;
            }
            let step = (available.len() as u64).min(n) as usize;
            self.consume(step);
            skipped += step as u64;
            n -= step as u64;
        }
        Ok(skipped)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the underlying reader. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ByteSource<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.buffered() == 0 && out.len() >= self.buf.len() {
            let n = self.inner.read(out)?;
            self.position += n as u64;
            return Ok(n);
        }
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for ByteSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.start >= self.end {
            self.start = 0;
            self.end = 0;
            loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => {
                        self.end = n;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(&self.buf[self.start..self.end])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.buffered());
        self.start += amt;
        self.position += amt as u64;
    }
}
