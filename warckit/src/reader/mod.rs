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

//! Streaming WARC record reader.

mod detect;
mod iter;
mod segment;

pub use detect::{is_compressed, is_warc_file, reader, reader_at, reader_with_options, GZIP_MAGIC, WARC_MAGIC};
pub use iter::Records;

use flate2::bufread::GzDecoder;
use std::io::{self, Read};

use crate::diagnostics::{DiagnosisType, Diagnostics};
use crate::digest::{DigestEncoding, DigestValue, Digester};
use crate::error::{Error, Result};
use crate::header::{decode_header_bytes, WarcHeader};
use crate::record::{RecordStream, WarcRecord};
use crate::registry::WarcRecordType;
use crate::stream::{ByteSource, DEFAULT_BUFFER_SIZE};
use crate::validation;
use segment::SegmentState;

/// WARC versions the reader knows about. Others are read with a warning.
pub const SUPPORTED_VERSIONS: [(u32, u32); 4] = [(0, 17), (0, 18), (1, 0), (1, 1)];

/// Default maximum length of a single header line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;


/// Reader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Verify `WARC-Block-Digest` when a record is closed.
    pub verify_block_digest: bool,
    /// Verify `WARC-Payload-Digest` when a record is closed.
    pub verify_payload_digest: bool,
    /// Header lines longer than this are split and reported.
    pub max_line_length: usize,
    pub buffer_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            verify_block_digest: true,
            verify_payload_digest: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}


type Member<R> = ByteSource<GzDecoder<ByteSource<R>>>;

/// Framing of the underlying stream.
enum Framing<R: Read> {
    /// Uncompressed WARC.
    Plain(ByteSource<R>),
    /// Inside a gzip member.
    Gzip(Member<R>),
    /// Between gzip members.
    GzipIdle(ByteSource<R>),
    /// Transient state while switching between the other states.
    Detached,
}

impl<R: Read> Framing<R> {
    fn read_line(&mut self, line: &mut Vec<u8>, limit: usize) -> io::Result<usize> {
        match self {
            Framing::Plain(s) => s.read_line(line, limit),
            Framing::Gzip(m) => m.read_line(line, limit),
            _ => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Framing::Plain(s) => s.read(buf),
            Framing::Gzip(m) => m.read(buf),
            _ => Ok(0),
        }
    }

    fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        match self {
            Framing::Plain(s) => s.peek(n),
            Framing::Gzip(m) => m.peek(n),
            _ => Ok(&[]),
        }
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        match self {
            Framing::Plain(s) => s.skip(n),
            Framing::Gzip(m) => m.skip(n),
            _ => Ok(0),
        }
    }

    /// Position in the uncompressed data. Restarts at zero for every gzip member.
    fn logical_position(&self) -> u64 {
        match self {
            Framing::Plain(s) => s.position(),
            Framing::Gzip(m) => m.position(),
            _ => 0,
        }
    }

    /// Position in the underlying (possibly compressed) stream.
    fn physical_position(&self) -> u64 {
        match self {
            Framing::Plain(s) | Framing::GzipIdle(s) => s.position(),
            Framing::Gzip(m) => m.get_ref().get_ref().position(),
            Framing::Detached => 0,
        }
    }
}


/// Finds the end of an HTTP header block so the payload digest covers the entity only.
#[derive(Debug, Default)]
struct HttpBoundary {
    tail: [u8; 3],
    found: bool,
}

impl HttpBoundary {
    /// Feed block bytes. Returns the index in `data` at which the payload starts, if known.
    fn feed(&mut self, data: &[u8]) -> Option<usize> {
        if self.found {
            return Some(0);
        }
        for (i, &b) in data.iter().enumerate() {
            if b == b'\n' && (self.tail[2] == b'\n' || (self.tail[2] == b'\r' && self.tail[1] == b'\n')) {
                self.found = true;
                return Some(i + 1);
            }
            self.tail = [self.tail[1], self.tail[2], b];
        }
        None
    }
}


/// Payload bookkeeping for the currently open record.
#[derive(Debug)]
struct OpenPayload {
    declared: Option<u64>,
    remaining: Option<u64>,
    read: u64,
    block: Option<(Digester, DigestValue)>,
    payload: Option<(Digester, DigestValue)>,
    boundary: Option<HttpBoundary>,
}

impl OpenPayload {
    fn update(&mut self, data: &[u8]) {
        self.read += data.len() as u64;
        if let Some(r) = &mut self.remaining {
            *r -= data.len() as u64;
        }
        if let Some((d, _)) = &mut self.block {
            d.update(data);
        }
        if let Some((d, _)) = &mut self.payload {
            match &mut self.boundary {
                Some(b) => {
                    if let Some(start) = b.feed(data) {
                        d.update(&data[start..]);
                    }
                }
                None => d.update(data),
            }
        }
    }

    /// Upper bound for the next read.
    fn read_limit(&self, len: usize) -> usize {
        match self.remaining {
            Some(r) => (r.min(len as u64)) as usize,
            None => len,
        }
    }

    /// Compare computed digests against the declared ones.
    fn verify(self, diagnostics: &mut Diagnostics) {
        if let Some((digester, expected)) = self.block {
            check_digest("WARC-Block-Digest", digester, &expected, diagnostics);
        }
        if let Some((digester, expected)) = self.payload {
            if self.boundary.as_ref().is_some_and(|b| !b.found) {
                diagnostics.warning(DiagnosisType::ErrorExpected, "WARC-Payload-Digest", ["HTTP header end"]);
            } else {
                check_digest("WARC-Payload-Digest", digester, &expected, diagnostics);
            }
        }
    }
}

fn check_digest(field: &str, digester: Digester, expected: &DigestValue, diagnostics: &mut Diagnostics) {
    let computed = digester.finalize();
    if computed != expected.bytes() {
        let encoding = expected.encoding().unwrap_or(DigestEncoding::Base32);
        let actual = DigestValue::from_bytes(expected.algorithm(), computed, encoding);
        diagnostics.error(DiagnosisType::InvalidExpected, field, [expected.text(), actual.text()]);
    }
}

/// Digest state for a declared digest, if it can be verified.
fn digester_for(value: Option<&DigestValue>) -> Option<(Digester, DigestValue)> {
    let value = value?;
    if !value.is_decoded() {
        return None;
    }
    Some((Digester::new(value.digest_algorithm()?), value.clone()))
}


/// WARC record stream reader.
///
/// Records are produced one at a time by [`WarcReader::next_record`]. A record borrows
/// the reader until it is closed or dropped, so only one record can be open at a time.
pub struct WarcReader<R: Read> {
    framing: Framing<R>,
    options: ReaderOptions,
    compressed: bool,
    diagnostics: Diagnostics,
    segments: SegmentState,
    open: Option<OpenPayload>,
    record_start: u64,
    closed_length: Option<u64>,
    records: u64,
    finished: bool,
}

impl<R: Read> WarcReader<R> {
    /// Reader for uncompressed input.
    pub fn new(source: R) -> Self {
        Self::with_options(source, false, ReaderOptions::default())
    }

    /// Reader for input consisting of one gzip member per record.
    pub fn new_compressed(source: R) -> Self {
        Self::with_options(source, true, ReaderOptions::default())
    }

    pub fn with_options(source: R, compressed: bool, options: ReaderOptions) -> Self {
        let source = ByteSource::with_capacity(options.buffer_size, source);
        Self::from_source(source, compressed, options)
    }

    /// Create a reader on top of an existing byte source, continuing at its position.
    pub fn from_source(source: ByteSource<R>, compressed: bool, options: ReaderOptions) -> Self {
        let framing = if compressed {
            Framing::GzipIdle(source)
        } else {
            Framing::Plain(source)
        };
        WarcReader {
            framing,
            options,
            compressed,
            diagnostics: Diagnostics::new(),
            segments: SegmentState::default(),
            open: None,
            record_start: 0,
            closed_length: None,
            records: 0,
            finished: false,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Stream-level findings that do not belong to any record, such as garbage at
    /// end of input or an unfinished segmented record.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Current position in the underlying (possibly compressed) stream.
    pub fn offset(&self) -> u64 {
        self.framing.physical_position()
    }

    /// Uncompressed bytes consumed of the current record so far.
    /// Once a record is closed, this is its total length including the trailer.
    pub fn consumed(&self) -> u64 {
        match self.closed_length {
            Some(n) => n,
            None => self.framing.logical_position().saturating_sub(self.record_start),
        }
    }

    /// Number of records closed so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Iterator over (frozen) records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records::new(self)
    }

    /// Advance to the next record.
    ///
    /// Returns `Ok(None)` at end of input. Malformed data is reported in the record's (or
    /// the reader's) diagnostics. Errors are only returned if the underlying stream fails or
    /// a compression frame is corrupt.
    pub fn next_record(&mut self) -> Result<Option<WarcRecord<'_>>> {
        if self.open.is_some() {
            let mut scratch = Diagnostics::new();
            self.finish_record(&mut scratch)?;
        }
        self.closed_length = None;
        if self.finished {
            return Ok(None);
        }

        loop {
            let frame_start = self.framing.physical_position();
            if !self.begin_frame()? {
                self.finish_input();
                return Ok(None);
            }

            let mut diagnostics = Diagnostics::new();
            match self.find_version_line(&mut diagnostics)? {
                Some(line) => {
                    let offset = if self.compressed { frame_start } else { self.record_start };
                    return self.open_record(&line, diagnostics, offset).map(Some);
                }
                None => {
                    self.diagnostics.append(&mut diagnostics);
                    if !self.compressed {
                        self.finish_input();
                        return Ok(None);
                    }
                    self.end_frame(&mut Diagnostics::new())?;
                }
            }
        }
    }

    /// Enter the next gzip member, if any. Plain input is a single frame.
    fn begin_frame(&mut self) -> Result<bool> {
        let source = match std::mem::replace(&mut self.framing, Framing::Detached) {
            Framing::GzipIdle(s) => s,
            other => {
                self.framing = other;
                return Ok(true);
            }
        };
        let mut source = source;
        let magic = match source.peek(GZIP_MAGIC.len()).map(<[u8]>::to_vec) {
            Ok(m) => m,
            Err(e) => {
                self.framing = Framing::GzipIdle(source);
                return Err(e.into());
            }
        };
        if magic.is_empty() {
            self.framing = Framing::GzipIdle(source);
            return Ok(false);
        }
        if magic != GZIP_MAGIC {
            let position = source.position();
            self.framing = Framing::GzipIdle(source);
            return Err(Error::Compression(format!("no gzip member at offset {}", position)));
        }
        tracing::trace!(offset = source.position(), "Entering gzip member");
        self.framing = Framing::Gzip(ByteSource::with_capacity(self.options.buffer_size, GzDecoder::new(source)));
        Ok(true)
    }

    /// Leave the current gzip member, reporting any data after the record.
    fn end_frame(&mut self, diagnostics: &mut Diagnostics) -> Result<()> {
        if !matches!(self.framing, Framing::Gzip(_)) {
            return Ok(());
        }
        let mut buf = vec![0u8; self.options.buffer_size.max(512)];
        let mut trailing = 0u64;
        loop {
            let n = self.framing.read(&mut buf)?;
            if n == 0 {
                break;
            }
            trailing += n as u64;
        }
        if trailing > 0 {
            diagnostics.error(DiagnosisType::UndesiredData, "Trailing data", [trailing.to_string()]);
        }
        if let Framing::Gzip(member) = std::mem::replace(&mut self.framing, Framing::Detached) {
            self.framing = Framing::GzipIdle(member.into_inner().into_inner());
        }
        Ok(())
    }

    /// Skip lines until a `WARC/` version line. Anything skipped is reported.
    fn find_version_line(&mut self, diagnostics: &mut Diagnostics) -> Result<Option<Vec<u8>>> {
        let mut empty_lines = 0usize;
        let mut data_lines = 0usize;
        let mut line = Vec::new();
        loop {
            self.record_start = self.framing.logical_position();
            line.clear();
            if self.framing.read_line(&mut line, self.options.max_line_length)? == 0 {
                break;
            }
            if line.starts_with(WARC_MAGIC) {
                report_skipped(empty_lines, data_lines, diagnostics);
                return Ok(Some(line));
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                empty_lines += 1;
            } else {
                data_lines += 1;
            }
        }

        if empty_lines + data_lines > 0 {
            report_skipped(empty_lines, data_lines, diagnostics);
            diagnostics.error(DiagnosisType::ErrorExpected, "WARC file", ["WARC/<version> line"]);
            tracing::debug!(empty_lines, data_lines, "No WARC record found before end of input");
        }
        Ok(None)
    }

    /// Parse the header after the version line and set up payload reading.
    fn open_record(&mut self, version_line: &[u8], mut diagnostics: Diagnostics, offset: u64) -> Result<WarcRecord<'_>> {
        let mut header = WarcHeader::new();
        header.set_version_line_bytes(version_line.trim_ascii_end());
        match header.version() {
            None => {
                let (line, _) = decode_header_bytes(version_line.trim_ascii_end());
                diagnostics.error(DiagnosisType::Invalid, "WARC version", [line]);
            }
            Some(v) if !SUPPORTED_VERSIONS.contains(&v) => {
                diagnostics.warning(DiagnosisType::Unknown, "WARC version", [format!("{}.{}", v.0, v.1)]);
            }
            Some(_) => {}
        }

        self.read_header_fields(&mut header, &mut diagnostics)?;
        validation::index_fields(&mut header, &mut diagnostics);
        self.segments.check(&header, &mut diagnostics);

        let declared = header.content_length();
        let remaining = match declared {
            Some(n) => Some(n),
            None if self.compressed => None,
            None => Some(0),
        };
        let payload_digest = match header.record_type() {
            Some(WarcRecordType::Revisit) => None,
            _ => header.payload_digest(),
        };
        let payload = digester_for(payload_digest.filter(|_| self.options.verify_payload_digest));
        let boundary = (payload.is_some() && header.is_http()).then(HttpBoundary::default);
        self.open = Some(OpenPayload {
            declared,
            remaining,
            read: 0,
            block: digester_for(header.block_digest().filter(|_| self.options.verify_block_digest)),
            payload,
            boundary,
        });

        tracing::debug!(
            offset,
            record_type = header.record_type_name().unwrap_or("-"),
            content_length = declared,
            errors = diagnostics.errors().len(),
            warnings = diagnostics.warnings().len(),
            "Parsed WARC record header"
        );
        Ok(WarcRecord::from_stream(header, diagnostics, offset, self))
    }

    fn read_header_fields(&mut self, header: &mut WarcHeader, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut line = Vec::new();
        let mut bare_lf = false;
        loop {
            line.clear();
            if self.framing.read_line(&mut line, self.options.max_line_length)? == 0 {
                diagnostics.error(DiagnosisType::ErrorExpected, "End of header", ["empty line"]);
                break;
            }

            let content = if let Some(c) = line.strip_suffix(b"\r\n") {
                c
            } else if let Some(c) = line.strip_suffix(b"\n") {
                bare_lf = true;
                c
            } else {
                if line.len() >= self.options.max_line_length {
                    diagnostics.error(DiagnosisType::Invalid, "Header line", ["line too long"]);
                }
                &line[..]
            };
            if content.is_empty() {
                break;
            }

            let (decoded, valid_utf8) = decode_header_bytes(content);
            if !valid_utf8 {
                diagnostics.error(DiagnosisType::InvalidEncoding, "Header line", [decoded.as_str(), "UTF-8"]);
            }

            if content[0] == b' ' || content[0] == b'\t' {
                header.fields_mut().add_continuation(content);
                continue;
            }
            match content.iter().position(|&b| b == b':') {
                Some(i) if !content[..i].trim_ascii().is_empty() => {
                    header.fields_mut().append_bytes(content[..i].trim_ascii(), content[i + 1..].trim_ascii());
                }
                _ => {
                    diagnostics.error(DiagnosisType::Invalid, "Header line", [decoded]);
                    header.fields_mut().append_bytes(b"", content);
                }
            }
        }
        if bare_lf {
            diagnostics.warning(DiagnosisType::InvalidExpected, "Header line endings", ["LF", "CRLF"]);
        }
        Ok(())
    }

    /// Skip unread payload, verify digests and the record trailer.
    fn finish_record(&mut self, diagnostics: &mut Diagnostics) -> Result<u64> {
        let Some(mut open) = self.open.take() else {
            return Ok(0);
        };

        let mut buf = vec![0u8; self.options.buffer_size.max(512)];
        loop {
            let limit = open.read_limit(buf.len());
            if limit == 0 {
                break;
            }
            let n = self.framing.read(&mut buf[..limit])?;
            if n == 0 {
                break;
            }
            open.update(&buf[..n]);
        }

        if let (Some(declared), Some(remaining)) = (open.declared, open.remaining) {
            if remaining > 0 {
                diagnostics.error(DiagnosisType::UndesiredData, "Content-Length",
                                  [declared.to_string(), open.read.to_string()]);
            }
        }
        let declared = open.declared;
        open.verify(diagnostics);
        let newlines = self.read_trailer()?;
        if declared.is_some() && newlines < 2 {
            diagnostics.error(DiagnosisType::InvalidExpected, "Trailing newlines", [newlines.to_string(), "2".to_string()]);
        }

        let consumed = self.consumed();
        self.closed_length = Some(consumed);
        self.end_frame(diagnostics)?;
        self.records += 1;
        tracing::trace!(consumed, offset = self.offset(), "Closed WARC record");
        Ok(consumed)
    }

    /// Consume up to two line breaks following the record block and return how many were found.
    fn read_trailer(&mut self) -> Result<usize> {
        let mut newlines = 0;
        while newlines < 2 {
            let step = {
                let next = self.framing.peek(2)?;
                if next.starts_with(b"\r\n") {
                    2
                } else if next.starts_with(b"\n") {
                    1
                } else {
                    0
                }
            };
            if step == 0 {
                break;
            }
            self.framing.skip(step)?;
            newlines += 1;
        }
        Ok(newlines)
    }

    fn finish_input(&mut self) {
        if !self.finished {
            self.finished = true;
            self.segments.finish(&mut self.diagnostics);
            tracing::debug!(records = self.records, offset = self.offset(), "Reached end of WARC input");
        }
    }
}

fn report_skipped(empty_lines: usize, data_lines: usize, diagnostics: &mut Diagnostics) {
    if data_lines > 0 {
        diagnostics.error(DiagnosisType::Invalid, "Data before WARC version", [data_lines.to_string()]);
    }
    if empty_lines > 0 {
        diagnostics.error(DiagnosisType::Invalid, "Empty lines before WARC version", [empty_lines.to_string()]);
    }
}

impl<R: Read> RecordStream for WarcReader<R> {
    fn read_payload(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(open) = self.open.as_mut() else {
            return Ok(0);
        };
        let limit = open.read_limit(buf.len());
        if limit == 0 {
            return Ok(0);
        }
        let n = self.framing.read(&mut buf[..limit])?;
        open.update(&buf[..n]);
        Ok(n)
    }

    fn payload_remaining(&self) -> Option<u64> {
        self.open.as_ref().and_then(|o| o.remaining)
    }

    fn close_record(&mut self, diagnostics: &mut Diagnostics) -> Result<u64> {
        self.finish_record(diagnostics)
    }
}
