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

//! WARC record writer.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

use crate::digest::{DigestAlgorithm, DigestEncoding, DigestValue, Digester};
use crate::error::{Error, Result};
use crate::header::WarcHeader;
use crate::record::WarcRecord;

/// Record trailer.
const RECORD_END: &[u8] = b"\r\n\r\n";


/// Write adapter counting the bytes passed to the underlying writer.
#[derive(Debug)]
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum Sink<W: Write> {
    Plain(CountingWriter<W>),
    /// Inside a gzip member.
    Gzip(GzEncoder<CountingWriter<W>>),
    /// Between gzip members.
    GzipIdle(CountingWriter<W>),
    /// A gzip member could not be finished and the output is lost.
    Detached,
}

impl<W: Write> Sink<W> {
    fn offset(&self) -> u64 {
        match self {
            Sink::Plain(w) | Sink::GzipIdle(w) => w.count,
            Sink::Gzip(e) => e.get_ref().count,
            Sink::Detached => 0,
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) | Sink::GzipIdle(w) => w.write(buf),
            Sink::Gzip(e) => e.write(buf),
            Sink::Detached => Err(io::Error::other("output stream lost after a failed write")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) | Sink::GzipIdle(w) => w.flush(),
            Sink::Gzip(e) => e.flush(),
            Sink::Detached => Ok(()),
        }
    }
}

#[derive(Debug)]
struct OpenRecord {
    expected: u64,
    written: u64,
    start: u64,
    digester: Option<Digester>,
}


/// Serializes WARC records, optionally compressing every record into its own gzip member.
///
/// Records are written in three steps: [`WarcWriter::write_header`], any number of payload
/// writes totalling exactly `Content-Length` bytes, and [`WarcWriter::close_record`].
/// [`WarcWriter::write_record`] does all three for a complete record.
pub struct WarcWriter<W: Write> {
    sink: Sink<W>,
    compression: Option<Compression>,
    digest_algorithm: Option<DigestAlgorithm>,
    open: Option<OpenRecord>,
    last_block_digest: Option<DigestValue>,
    records: u64,
}

impl<W: Write> WarcWriter<W> {
    /// Writer for uncompressed output.
    pub fn new(writer: W) -> Self {
        WarcWriter {
            sink: Sink::Plain(CountingWriter { inner: writer, count: 0 }),
            compression: None,
            digest_algorithm: None,
            open: None,
            last_block_digest: None,
            records: 0,
        }
    }

    /// Writer compressing each record with the default gzip level.
    pub fn new_compressed(writer: W) -> Self {
        Self::with_compression(writer, Compression::default().level())
    }

    /// Writer compressing each record with the given gzip level (0-9).
    pub fn with_compression(writer: W, level: u32) -> Self {
        WarcWriter {
            sink: Sink::GzipIdle(CountingWriter { inner: writer, count: 0 }),
            compression: Some(Compression::new(level.min(9))),
            digest_algorithm: None,
            open: None,
            last_block_digest: None,
            records: 0,
        }
    }

    /// Compute a block digest of every record while writing it.
    /// The result is available as [`WarcWriter::last_block_digest`] after closing a record.
    pub fn with_block_digest(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = Some(algorithm);
        self
    }

    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }

    /// Bytes written to the underlying writer so far.
    pub fn offset(&self) -> u64 {
        self.sink.offset()
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Whether a record has been started but not closed.
    pub fn is_record_open(&self) -> bool {
        self.open.is_some()
    }

    /// Block digest of the most recently closed record, if digesting is enabled.
    pub fn last_block_digest(&self) -> Option<&DigestValue> {
        self.last_block_digest.as_ref()
    }

    /// Start a new record by writing its header.
    ///
    /// The header must carry a valid `Content-Length`, which the payload writes are checked against.
    pub fn write_header(&mut self, header: &WarcHeader) -> Result<()> {
        if self.open.is_some() {
            return Err(Error::IllegalState("previous record has not been closed"));
        }
        let expected = header.content_length().ok_or(Error::MissingContentLength)?;
        if header.version_line().is_empty() {
            return Err(Error::InvalidArgument("header has no WARC version line".to_string()));
        }
        if let Some(line) = header.fields().malformed_line() {
            return Err(Error::InvalidArgument(format!("malformed header line {:?}", line)));
        }

        let start = self.offset();
        self.begin_frame();
        header.write(&mut self.sink)?;
        self.open = Some(OpenRecord {
            expected,
            written: 0,
            start,
            digester: self.digest_algorithm.map(Digester::new),
        });
        Ok(())
    }

    /// Write a chunk of the current record's payload.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<()> {
        let Some(open) = self.open.as_mut() else {
            return Err(Error::IllegalState("no record header has been written"));
        };
        let written = open.written + data.len() as u64;
        if written > open.expected {
            return Err(Error::PayloadLength { expected: open.expected, written });
        }
        self.sink.write_all(data)?;
        open.written = written;
        if let Some(d) = &mut open.digester {
            d.update(data);
        }
        Ok(())
    }

    /// Copy a payload stream into the current record. Returns the number of bytes copied.
    pub fn stream_payload<S: Read + ?Sized>(&mut self, source: &mut S) -> Result<u64> {
        let mut buf = [0u8; 8192];
        let mut total = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write_payload(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Finish the current record. Returns the number of bytes the record occupies in the output.
    pub fn close_record(&mut self) -> Result<u64> {
        let open = self.open.take().ok_or(Error::IllegalState("no record header has been written"))?;
        if open.written != open.expected {
            let err = Error::PayloadLength { expected: open.expected, written: open.written };
            self.open = Some(open);
            return Err(err);
        }
        self.sink.write_all(RECORD_END)?;
        self.end_frame()?;
        self.last_block_digest = open.digester
            .map(|d| DigestValue::from_bytes(d.algorithm().as_str(), d.finalize(), DigestEncoding::Base32));
        self.records += 1;

        let length = self.offset() - open.start;
        tracing::trace!(offset = open.start, length, payload = open.written, "Wrote WARC record");
        Ok(length)
    }

    /// Write a complete record. Frozen records are written from memory, streamed records
    /// copy their remaining payload.
    pub fn write_record(&mut self, record: &mut WarcRecord<'_>) -> Result<u64> {
        self.write_header(record.header())?;
        if let Some(content) = record.content() {
            self.write_payload(content)?;
        } else {
            let mut payload = record.payload()?;
            self.stream_payload(&mut payload)?;
        }
        self.close_record()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Finish writing and return the underlying writer.
    pub fn close(mut self) -> Result<W> {
        if self.open.is_some() {
            return Err(Error::IllegalState("cannot close writer with an open record"));
        }
        self.sink.flush()?;
        match std::mem::replace(&mut self.sink, Sink::Detached) {
            Sink::Plain(w) | Sink::GzipIdle(w) => Ok(w.inner),
            Sink::Gzip(e) => Ok(e.finish()?.inner),
            Sink::Detached => Err(Error::IllegalState("output stream lost after a failed write")),
        }
    }

    fn begin_frame(&mut self) {
        let Some(level) = self.compression else {
            return;
        };
        if !matches!(self.sink, Sink::GzipIdle(_)) {
            return;
        }
        if let Sink::GzipIdle(w) = std::mem::replace(&mut self.sink, Sink::Detached) {
            self.sink = Sink::Gzip(GzEncoder::new(w, level));
        }
    }

    fn end_frame(&mut self) -> Result<()> {
        if !matches!(self.sink, Sink::Gzip(_)) {
            return Ok(());
        }
        if let Sink::Gzip(e) = std::mem::replace(&mut self.sink, Sink::Detached) {
            self.sink = Sink::GzipIdle(e.finish()?);
        }
        Ok(())
    }
}
