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

use std::io::Read;

use super::WarcReader;
use crate::error::{Error, Result};
use crate::record::WarcRecord;


/// Iterator over the records of a [`WarcReader`].
///
/// Records are frozen, i.e. their payload is buffered in memory and their diagnostics are
/// final. A stream failure ends the iteration; the error is kept and can be retrieved with
/// [`Records::last_error`].
pub struct Records<'r, R: Read> {
    reader: &'r mut WarcReader<R>,
    peeked: Option<WarcRecord<'static>>,
    last_error: Option<Error>,
    exhausted: bool,
    type_filter: Option<u16>,
}

impl<'r, R: Read> Records<'r, R> {
    pub(crate) fn new(reader: &'r mut WarcReader<R>) -> Self {
        Records {
            reader,
            peeked: None,
            last_error: None,
            exhausted: false,
            type_filter: None,
        }
    }

    /// Only yield records whose type matches the given bitmask (see
    /// [`crate::WarcRecordType::bit`]). Records of unknown type are skipped as well.
    pub fn with_type_filter(mut self, bitmask: u16) -> Self {
        self.type_filter = Some(bitmask);
        self
    }

    /// Whether another record is available. Never fails; a failure while advancing
    /// ends the iteration and is stored as [`Records::last_error`].
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_some() {
            return true;
        }
        if self.exhausted {
            return false;
        }
        match self.advance() {
            Ok(Some(record)) => {
                self.peeked = Some(record);
                true
            }
            Ok(None) => {
                self.exhausted = true;
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, offset = self.reader.offset(), "Failed to read WARC record");
                self.last_error = Some(e);
                self.exhausted = true;
                false
            }
        }
    }

    /// Next record, [`Error::NoSuchElement`] if there is none.
    pub fn next_record(&mut self) -> Result<WarcRecord<'static>> {
        if self.has_next() {
            if let Some(record) = self.peeked.take() {
                return Ok(record);
            }
        }
        Err(Error::NoSuchElement)
    }

    /// The failure that ended the iteration, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }

    fn advance(&mut self) -> Result<Option<WarcRecord<'static>>> {
        loop {
            let Some(mut record) = self.reader.next_record()? else {
                return Ok(None);
            };
            let selected = match self.type_filter {
                None => true,
                Some(mask) => record.record_type().is_some_and(|t| t.matches_bitmask(mask)),
            };
            if selected {
                return record.freeze().map(Some);
            }
            record.close()?;
        }
    }
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = WarcRecord<'static>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            self.peeked.take()
        } else {
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WarcRecordType;
    use std::io::Cursor;

    fn record(record_type: &str, body: &str) -> String {
        format!("WARC/1.1\r\nWARC-Type: {}\r\nContent-Length: {}\r\n\r\n{}\r\n\r\n", record_type, body.len(), body)
    }

    #[test]
    fn test_iterate_and_exhaust() {
        let data = record("resource", "one") + &record("metadata", "two");
        let mut reader = WarcReader::new(Cursor::new(data.into_bytes()));
        let mut records = reader.records();
        assert!(records.has_next());
        assert!(records.has_next());
        let first = records.next_record().unwrap();
        assert_eq!(first.content(), Some(&b"one"[..]));
        let second = records.next_record().unwrap();
        assert_eq!(second.record_type(), Some(WarcRecordType::Metadata));
        assert!(!records.has_next());
        assert!(matches!(records.next_record(), Err(Error::NoSuchElement)));
        assert!(records.last_error().is_none());
    }

    #[test]
    fn test_type_filter() {
        let data = record("resource", "one") + &record("metadata", "two") + &record("resource", "three");
        let mut reader = WarcReader::new(Cursor::new(data.into_bytes()));
        let contents: Vec<Vec<u8>> = reader.records()
            .with_type_filter(WarcRecordType::Metadata.bit())
            .map(|r| r.content().unwrap_or_default().to_vec())
            .collect();
        assert_eq!(contents, vec![b"two".to_vec()]);
        assert_eq!(reader.records_read(), 3);
    }

    #[test]
    fn test_stream_failure_is_captured() {
        let mut data = record("resource", "one").into_bytes();
        data.extend_from_slice(b"not gzip");
        let mut reader = WarcReader::new_compressed(Cursor::new(data));
        let mut records = reader.records();
        assert!(!records.has_next());
        assert!(records.last_error().is_some_and(Error::is_compression));
        assert!(records.take_last_error().is_some());
        assert!(records.last_error().is_none());
        assert!(records.next().is_none());
    }
}
