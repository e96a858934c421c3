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

use std::io::{self, Read};
use uuid::Uuid;

use crate::diagnostics::Diagnostics;
use crate::digest::{self, DigestAlgorithm, DigestEncoding, DigestValue};
use crate::error::{Error, Result};
use crate::header::WarcHeader;
use crate::registry::{FieldCode, WarcRecordType};
use crate::validation::format_warc_date;


/// Payload access to the record a reader is currently positioned on.
pub(crate) trait RecordStream {
    /// Read payload bytes, never past the end of the current record.
    fn read_payload(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Declared payload bytes not yet read, `None` if the length is implicit.
    fn payload_remaining(&self) -> Option<u64>;

    /// Skip the unread payload, verify digests and the record trailer, and position the
    /// stream at the next record. Returns the number of bytes the record occupied.
    fn close_record(&mut self, diagnostics: &mut Diagnostics) -> Result<u64>;
}

enum Body<'a> {
    Stream(&'a mut dyn RecordStream),
    Buffered(io::Cursor<Vec<u8>>),
}


/// A WARC record.
///
/// Records returned by a reader borrow it and stream their payload from it. Such a record
/// must be closed (or dropped) before the reader can advance. [`WarcRecord::freeze`]
/// detaches a record from its reader by buffering the payload in memory.
pub struct WarcRecord<'a> {
    header: WarcHeader,
    diagnostics: Diagnostics,
    offset: u64,
    length: Option<u64>,
    body: Body<'a>,
    closed: bool,
}

impl Default for WarcRecord<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl WarcRecord<'static> {
    /// Create a new empty WARC record.
    pub fn new() -> Self {
        WarcRecord {
            header: WarcHeader::with_version_line("WARC/1.1"),
            diagnostics: Diagnostics::new(),
            offset: 0,
            length: None,
            body: Body::Buffered(io::Cursor::new(Vec::new())),
            closed: false,
        }
    }

    /// Create a record from an existing header with an empty in-memory body.
    pub fn from_header(header: WarcHeader) -> Self {
        WarcRecord {
            header,
            diagnostics: Diagnostics::new(),
            offset: 0,
            length: None,
            body: Body::Buffered(io::Cursor::new(Vec::new())),
            closed: false,
        }
    }
}

impl<'a> WarcRecord<'a> {
    pub(crate) fn from_stream(header: WarcHeader, diagnostics: Diagnostics, offset: u64, stream: &'a mut dyn RecordStream) -> Self {
        WarcRecord {
            header,
            diagnostics,
            offset,
            length: None,
            body: Body::Stream(stream),
            closed: false,
        }
    }

    /// Record type (same as `headers['WARC-Type']`), `None` if missing or unknown.
    pub fn record_type(&self) -> Option<WarcRecordType> {
        self.header.record_type()
    }

    /// Set record type.
    pub fn set_record_type(&mut self, record_type: WarcRecordType) {
        self.header.set(FieldCode::WarcType.name(), record_type.as_str());
    }

    /// Record ID (same as `headers['WARC-Record-ID']`).
    pub fn record_id(&self) -> Option<&str> {
        self.header.record_id()
    }

    /// WARC record header.
    pub fn header(&self) -> &WarcHeader {
        &self.header
    }

    /// WARC record header (mutable).
    pub fn header_mut(&mut self) -> &mut WarcHeader {
        &mut self.header
    }

    /// Validation findings. Payload-related findings are only present after closing.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Whether record is an HTTP record.
    pub fn is_http(&self) -> bool {
        self.header.is_http()
    }

    /// Mark the block as an HTTP message by setting a matching `Content-Type`.
    pub fn set_is_http(&mut self) {
        let content_type = match self.record_type() {
            Some(WarcRecordType::Request) => "application/http; msgtype=request",
            Some(WarcRecordType::Response) => "application/http; msgtype=response",
            _ => "application/http",
        };
        self.header.set(FieldCode::ContentType.name(), content_type);
    }

    /// Declared `Content-Length`.
    pub fn content_length(&self) -> Option<u64> {
        self.header.content_length()
    }

    /// In-memory body of a frozen or locally built record.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Buffered(c) => Some(c.get_ref()),
            Body::Stream(_) => None,
        }
    }

    /// WARC record start offset in the underlying stream. For compressed input this is the
    /// offset of the compression frame holding the record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes the record occupied in the (uncompressed) stream, known after closing.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Whether the payload is held in memory rather than streamed from a reader.
    pub fn is_frozen(&self) -> bool {
        matches!(self.body, Body::Buffered(_))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Initialize mandatory headers in a fresh WARC record instance.
    ///
    /// # Arguments
    ///
    /// * `content_length` - WARC record body length in bytes
    /// * `record_type` - WARC-Type
    /// * `record_urn` - WARC-Record-ID as URN without `'<'`, `'>'` (if unset, a random URN will be generated)
    pub fn init_headers(
        &mut self,
        content_length: u64,
        record_type: WarcRecordType,
        record_urn: Option<&str>,
    ) {
        let urn = match record_urn {
            Some(urn) => urn.to_string(),
            None => format!("urn:uuid:{}", Uuid::new_v4()),
        };

        let mut header = WarcHeader::with_version_line("WARC/1.1");
        let fields = header.fields_mut();
        fields.append(FieldCode::WarcType.name(), record_type.as_str());
        fields.append(FieldCode::WarcDate.name(), format_warc_date(&chrono::Utc::now()));
        fields.append(FieldCode::RecordId.name(), format!("<{}>", urn));
        fields.append(FieldCode::ContentLength.name(), content_length.to_string());
        header.refresh();
        self.header = header;
    }

    /// Set WARC body and update `Content-Length` accordingly.
    pub fn set_content(&mut self, content: Vec<u8>) -> Result<()> {
        if let Body::Stream(_) = self.body {
            return Err(Error::IllegalState("cannot replace the body of a streamed record"));
        }
        self.header.set(FieldCode::ContentLength.name(), content.len().to_string());
        self.body = Body::Buffered(io::Cursor::new(content));
        self.closed = false;
        Ok(())
    }

    /// Compute the block digest of the in-memory body and store it as `WARC-Block-Digest`.
    pub fn set_block_digest(&mut self, algorithm: DigestAlgorithm, encoding: DigestEncoding) -> Result<DigestValue> {
        let Some(content) = self.content() else {
            return Err(Error::IllegalState("block digest requires an in-memory body"));
        };
        let value = digest::compute(algorithm, content, encoding);
        self.header.set(FieldCode::BlockDigest.name(), value.text());
        Ok(value)
    }

    /// Reader over the record payload.
    pub fn payload(&mut self) -> Result<Payload<'_, 'a>> {
        if self.closed {
            return Err(Error::RecordClosed);
        }
        Ok(Payload { record: self })
    }

    /// Read the remaining payload into memory.
    pub fn read_payload_to_end(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.payload()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Close the record.
    ///
    /// For streamed records this consumes any unread payload, verifies digests, and checks the
    /// record trailer. The findings are added to [`WarcRecord::diagnostics`]. Closing twice
    /// is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Body::Stream(stream) = &mut self.body {
            self.length = Some(stream.close_record(&mut self.diagnostics)?);
        }
        Ok(())
    }

    /// "Freeze" a record by baking in the remaining payload stream contents.
    ///
    /// The returned record no longer borrows the reader and can be kept around.
    /// Freezing a streamed record closes it, so its diagnostics are final.
    pub fn freeze(mut self) -> Result<WarcRecord<'static>> {
        let content = match &mut self.body {
            Body::Buffered(c) => {
                let start = (c.position() as usize).min(c.get_ref().len());
                c.get_mut().split_off(start)
            }
            Body::Stream(_) => {
                let content = self.read_payload_to_end()?;
                self.close()?;
                content
            }
        };
        self.closed = true;
        Ok(WarcRecord {
            header: std::mem::take(&mut self.header),
            diagnostics: std::mem::take(&mut self.diagnostics),
            offset: self.offset,
            length: self.length,
            body: Body::Buffered(io::Cursor::new(content)),
            closed: false,
        })
    }

    fn read_body(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::Stream(stream) => stream.read_payload(buf),
            Body::Buffered(cursor) => cursor.read(buf),
        }
    }

    fn remaining(&self) -> Option<u64> {
        match &self.body {
            Body::Stream(stream) => stream.payload_remaining(),
            Body::Buffered(cursor) => Some((cursor.get_ref().len() as u64).saturating_sub(cursor.position())),
        }
    }
}

impl Drop for WarcRecord<'_> {
    fn drop(&mut self) {
        if self.closed || self.is_frozen() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(offset = self.offset, error = %e, "Failed to close dropped WARC record");
        }
    }
}

impl std::fmt::Debug for WarcRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarcRecord")
            .field("header", &self.header)
            .field("diagnostics", &self.diagnostics)
            .field("offset", &self.offset)
            .field("frozen", &self.is_frozen())
            .field("closed", &self.closed)
            .finish()
    }
}


/// Bounded reader over a record's payload.
pub struct Payload<'p, 'a> {
    record: &'p mut WarcRecord<'a>,
}

impl Payload<'_, '_> {
    /// Declared bytes left to read, `None` if the payload extends to the end of its frame.
    pub fn remaining(&self) -> Option<u64> {
        self.record.remaining()
    }
}

impl Read for Payload<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.record.read_body(buf)
    }
}
