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

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use chrono::{DateTime, Utc};
use encoding::{Encoding, DecoderTrap};
use encoding::all::WINDOWS_1252;

use crate::diagnostics::Diagnostics;
use crate::digest::DigestValue;
use crate::registry::{FieldCode, WarcRecordType};
use crate::validation;


/// Case-insensitive string key for headers
#[derive(Debug, Eq, Clone)]
pub struct CaseInsensitiveKey(String);

impl CaseInsensitiveKey {
    fn new(s: impl Into<String>) -> Self {
        CaseInsensitiveKey(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CaseInsensitiveKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl std::hash::Hash for CaseInsensitiveKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

impl From<&str> for CaseInsensitiveKey {
    fn from(s: &str) -> Self {
        CaseInsensitiveKey(s.to_string())
    }
}

impl From<CaseInsensitiveKey> for String {
    fn from(key: CaseInsensitiveKey) -> Self {
        key.0
    }
}


/// Decode header bytes as UTF-8, falling back to windows-1252.
///
/// The flag is `false` if the fallback had to be used.
pub(crate) fn decode_header_bytes(bytes: &[u8]) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), true),
        Err(_) => (
            WINDOWS_1252.decode(bytes, DecoderTrap::Replace)
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
            false,
        ),
    }
}


/// Ordered multimap representing a WARC header block.
///
/// Keys are compared case-insensitively, but their original spelling is kept for output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    status_line: Vec<u8>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the header status line.
    pub fn status_line(&self) -> String {
        decode_header_bytes(&self.status_line).0
    }

    /// Get the raw status line as bytes.
    pub fn status_line_bytes(&self) -> &[u8] {
        &self.status_line
    }

    /// Set status line contents.
    pub fn set_status_line(&mut self, status_line: impl AsRef<[u8]>) {
        self.status_line = status_line.as_ref().to_vec();
    }

    /// Get the first value for a (case-insensitive) header key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_bytes(key.as_bytes()).map(|v| decode_header_bytes(v).0)
    }

    /// Get the first raw value for a (case-insensitive) header key.
    pub fn get_bytes(&self, key: &[u8]) -> Option<&[u8]> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// Get all values for a (case-insensitive) header key in order of appearance.
    pub fn get_all(&self, key: &str) -> Vec<String> {
        let key = key.as_bytes();
        self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| decode_header_bytes(v).0)
            .collect()
    }

    /// Check if a (case-insensitive) header key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        let key_bytes = key.as_bytes();
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key_bytes))
    }

    /// Insert new header and overwrite existing header(s) if the key already exists.
    ///
    /// If a header already exists, its first occurrence will be updated and
    /// all following occurrences will be dropped.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.set_bytes(key.as_ref().as_bytes(), value.as_ref().as_bytes());
    }

    /// Byte variant of [`HeaderMap::set`].
    pub fn set_bytes(&mut self, key: &[u8], value: &[u8]) {
        let key = key.trim_ascii();
        let mut found = false;
        self.headers.retain_mut(|h| {
            if !h.0.eq_ignore_ascii_case(key) {
                true
            } else if !found {
                *h = (key.to_vec(), value.trim_ascii().to_vec());
                found = true;
                true
            } else {
                false
            }
        });
        if !found {
            self.headers.push((key.to_vec(), value.trim_ascii().to_vec()));
        }
    }

    /// Append header without checking for existing headers with the same name.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.append_bytes(key.as_ref().as_bytes(), value.as_ref().as_bytes());
    }

    /// Byte variant of [`HeaderMap::append`].
    pub fn append_bytes(&mut self, key: &[u8], value: &[u8]) {
        self.headers.push((key.trim_ascii().to_vec(), value.trim_ascii().to_vec()));
    }

    /// Remove all occurrences of a header. Returns whether anything was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key.as_bytes()));
        before != self.headers.len()
    }

    /// Iterator of keys and values.
    pub fn items(&self) -> impl Iterator<Item = (String, String)> + use<'_> {
        self.headers
            .iter()
            .map(|(k, v)| (decode_header_bytes(k).0, decode_header_bytes(v).0))
    }

    /// Iterator of raw keys and values.
    pub fn raw_items(&self) -> impl Iterator<Item = (&[u8], &[u8])> + use<'_> {
        self.headers.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Iterator of header keys.
    pub fn keys(&self) -> impl Iterator<Item = String> + use<'_> {
        self.headers
            .iter()
            .map(|(k, _)| decode_header_bytes(k).0)
    }

    /// Headers as a series of String tuples.
    ///
    /// Duplicate headers will be preserved.
    pub fn to_tuples(&self) -> Vec<(String, String)> {
        self.items().collect()
    }

    /// Headers as a String HashMap.
    ///
    /// If multiple headers have the same key, the values will be concatenated with `","`.
    pub fn to_map(&self) -> HashMap<CaseInsensitiveKey, String> {
        let mut map: HashMap<CaseInsensitiveKey, String> = HashMap::new();
        self.items()
            .for_each(|(k, v)| {
                map.entry(CaseInsensitiveKey::new(k)).and_modify(|v_| {
                    v_.push(',');
                    v_.push_str(&v);
                }).or_insert(v);
            });
        map
    }

    /// Get the number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the header map is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.status_line.clear();
    }

    /// Write header block into stream.
    ///
    /// Line breaks inside values are replaced with spaces so every field stays on one line.
    /// The terminating empty line is not written.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let mut bytes_written = 0usize;
        if !self.status_line.is_empty() {
            writer.write_all(&self.status_line)?;
            bytes_written += self.status_line.len();
            writer.write_all(b"\r\n")?;
            bytes_written += 2;
        }
        for (key, value) in &self.headers {
            if !key.is_empty() {
                writer.write_all(key)?;
                bytes_written += key.len();
                writer.write_all(b": ")?;
                bytes_written += 2;
            }
            let value: Vec<u8> = value.iter()
                .map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b })
                .collect();
            writer.write_all(&value)?;
            bytes_written += value.len();
            writer.write_all(b"\r\n")?;
            bytes_written += 2;
        }
        Ok(bytes_written)
    }

    /// First status line or field name that cannot be written as a single well-formed line.
    ///
    /// Field names must be non-empty, free of surrounding whitespace, and must not contain
    /// line breaks or colons.
    pub fn malformed_line(&self) -> Option<String> {
        let is_break = |b: &u8| *b == b'\r' || *b == b'\n';
        if self.status_line.iter().any(is_break) {
            return Some(decode_header_bytes(&self.status_line).0);
        }
        self.headers.iter()
            .map(|(k, _)| k)
            .find(|k| k.is_empty()
                || k.trim_ascii().len() != k.len()
                || k.iter().any(|b| is_break(b) || *b == b':'))
            .map(|k| decode_header_bytes(k).0)
    }

    pub(crate) fn add_continuation(&mut self, value: &[u8]) {
        if let Some(last) = self.headers.last_mut() {
            last.1.push(b' ');
            last.1.extend_from_slice(value.trim_ascii());
        } else {
            self.headers.push((Vec::new(), value.trim_ascii().to_vec()));
        }
    }
}


/// Semantic values of well-known fields, taken from the first valid occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FieldCache {
    pub(crate) record_type: Option<WarcRecordType>,
    pub(crate) record_type_name: Option<String>,
    pub(crate) record_id: Option<String>,
    pub(crate) date: Option<DateTime<Utc>>,
    pub(crate) content_length: Option<u64>,
    pub(crate) content_type: Option<String>,
    pub(crate) concurrent_to: Vec<String>,
    pub(crate) block_digest: Option<DigestValue>,
    pub(crate) payload_digest: Option<DigestValue>,
    pub(crate) ip_address: Option<IpAddr>,
    pub(crate) refers_to: Option<String>,
    pub(crate) target_uri: Option<String>,
    pub(crate) truncated: Option<String>,
    pub(crate) warcinfo_id: Option<String>,
    pub(crate) filename: Option<String>,
    pub(crate) profile: Option<String>,
    pub(crate) segment_origin_id: Option<String>,
    pub(crate) segment_number: Option<u64>,
    pub(crate) segment_total_length: Option<u64>,
}


/// WARC record header: version line, ordered fields, and cached values of known fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarcHeader {
    fields: HeaderMap,
    version: Option<(u32, u32)>,
    pub(crate) cache: FieldCache,
}

impl WarcHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header with the given version line, e.g. `WARC/1.1`.
    pub fn with_version_line(version_line: &str) -> Self {
        let mut header = Self::new();
        header.set_version_line(version_line);
        header
    }

    /// Raw version line, e.g. `WARC/1.0`.
    pub fn version_line(&self) -> String {
        self.fields.status_line()
    }

    /// Parsed `(major, minor)` version, if the version line is well-formed.
    pub fn version(&self) -> Option<(u32, u32)> {
        self.version
    }

    pub fn set_version_line(&mut self, version_line: &str) {
        self.fields.set_status_line(version_line.trim().as_bytes());
        self.version = parse_version_line(version_line.as_bytes());
    }

    pub(crate) fn set_version_line_bytes(&mut self, line: &[u8]) {
        self.fields.set_status_line(line);
        self.version = parse_version_line(line);
    }

    /// All header fields.
    pub fn fields(&self) -> &HeaderMap {
        &self.fields
    }

    /// Get the first value of a field.
    pub fn get(&self, name: &str) -> Option<String> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Replace a field and refresh the cached values.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.fields.set(name, value);
        self.refresh();
    }

    /// Append a field and refresh the cached values.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) {
        self.fields.append(name, value);
        self.refresh();
    }

    /// Remove a field and refresh the cached values.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.fields.remove(name);
        if removed {
            self.refresh();
        }
        removed
    }

    pub(crate) fn fields_mut(&mut self) -> &mut HeaderMap {
        &mut self.fields
    }

    /// Known field code of every field line, `None` for unknown or nameless lines.
    pub fn field_codes(&self) -> impl Iterator<Item = Option<FieldCode>> + use<'_> {
        self.fields.raw_items().map(|(k, _)| std::str::from_utf8(k).ok().and_then(FieldCode::from_name))
    }

    /// Re-derive cached values without collecting diagnostics.
    pub(crate) fn refresh(&mut self) {
        let mut scratch = Diagnostics::new();
        validation::index_fields(self, &mut scratch);
    }

    /// Resolved record type, `None` if missing or not a registered type.
    pub fn record_type(&self) -> Option<WarcRecordType> {
        self.cache.record_type
    }

    /// Record type name as given in `WARC-Type`.
    pub fn record_type_name(&self) -> Option<&str> {
        self.cache.record_type_name.as_deref()
    }

    /// `WARC-Record-ID` including angle brackets.
    pub fn record_id(&self) -> Option<&str> {
        self.cache.record_id.as_deref()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.cache.date
    }

    pub fn content_length(&self) -> Option<u64> {
        self.cache.content_length
    }

    pub fn content_type(&self) -> Option<&str> {
        self.cache.content_type.as_deref()
    }

    pub fn concurrent_to(&self) -> &[String] {
        &self.cache.concurrent_to
    }

    pub fn block_digest(&self) -> Option<&DigestValue> {
        self.cache.block_digest.as_ref()
    }

    pub fn payload_digest(&self) -> Option<&DigestValue> {
        self.cache.payload_digest.as_ref()
    }

    pub fn ip_address(&self) -> Option<IpAddr> {
        self.cache.ip_address
    }

    pub fn refers_to(&self) -> Option<&str> {
        self.cache.refers_to.as_deref()
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.cache.target_uri.as_deref()
    }

    pub fn truncated(&self) -> Option<&str> {
        self.cache.truncated.as_deref()
    }

    pub fn warcinfo_id(&self) -> Option<&str> {
        self.cache.warcinfo_id.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.cache.filename.as_deref()
    }

    pub fn profile(&self) -> Option<&str> {
        self.cache.profile.as_deref()
    }

    pub fn segment_origin_id(&self) -> Option<&str> {
        self.cache.segment_origin_id.as_deref()
    }

    pub fn segment_number(&self) -> Option<u64> {
        self.cache.segment_number
    }

    pub fn segment_total_length(&self) -> Option<u64> {
        self.cache.segment_total_length
    }

    /// Whether the block is an HTTP message.
    pub fn is_http(&self) -> bool {
        self.content_type()
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/http"))
            .unwrap_or(false)
    }

    /// Write version line, fields, and the terminating empty line.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let n = self.fields.write(writer)?;
        writer.write_all(b"\r\n")?;
        Ok(n + 2)
    }
}

/// Parse `WARC/<major>.<minor>` (line terminator allowed).
pub(crate) fn parse_version_line(line: &[u8]) -> Option<(u32, u32)> {
    let line = std::str::from_utf8(line).ok()?.trim_end_matches(['\r', '\n']);
    let version = line.strip_prefix("WARC/")?;
    let (major, minor) = version.split_once('.')?;
    if major.is_empty() || minor.is_empty()
        || !major.bytes().all(|b| b.is_ascii_digit())
        || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((major.parse().ok()?, minor.parse().ok()?))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_is_case_insensitive() {
        let mut map = HeaderMap::new();
        map.append("WARC-Type", "response");
        map.append("warc-concurrent-to", "<urn:a>");
        map.append("WARC-Concurrent-To", "<urn:b>");

        assert_eq!(map.get("warc-type"), Some("response".to_string()));
        assert_eq!(map.get("WARC-CONCURRENT-TO"), Some("<urn:a>".to_string()));
        assert_eq!(map.get_all("WARC-Concurrent-To"), vec!["<urn:a>", "<urn:b>"]);
        assert!(map.contains_key("Warc-Type"));

        let as_map = map.to_map();
        assert_eq!(as_map.get(&CaseInsensitiveKey::from("WARC-CONCURRENT-TO")), Some(&"<urn:a>,<urn:b>".to_string()));
    }

    #[test]
    fn test_set_replaces_first_and_drops_rest() {
        let mut map = HeaderMap::new();
        map.append("A", "1");
        map.append("B", "2");
        map.append("a", "3");
        map.set("A", "4");
        assert_eq!(map.to_tuples(), vec![("A".to_string(), "4".to_string()), ("B".to_string(), "2".to_string())]);
        assert!(map.remove("b"));
        assert!(!map.remove("b"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_write_preserves_order_and_case() {
        let mut map = HeaderMap::new();
        map.set_status_line("WARC/1.1");
        map.append("WARC-Type", "resource");
        map.append("x-custom", "a\r\nb");
        let mut out = Vec::new();
        let n = map.write(&mut out).unwrap();
        assert_eq!(out, b"WARC/1.1\r\nWARC-Type: resource\r\nx-custom: a  b\r\n");
        assert_eq!(n, out.len());
    }

    #[test]
    fn test_malformed_lines() {
        let mut map = HeaderMap::new();
        map.set_status_line("WARC/1.1");
        map.append("WARC-Type", "resource");
        assert_eq!(map.malformed_line(), None);

        map.append("X-Bad\r\nInjected", "x");
        assert_eq!(map.malformed_line().as_deref(), Some("X-Bad\r\nInjected"));

        let mut map = HeaderMap::new();
        map.append("Name: value", "x");
        assert!(map.malformed_line().is_some());

        let mut map = HeaderMap::new();
        map.add_continuation(b"orphan");
        assert_eq!(map.malformed_line().as_deref(), Some(""));

        let mut map = HeaderMap::new();
        map.set_status_line("WARC/1.1\r\nX: y");
        assert!(map.malformed_line().is_some());
    }

    #[test]
    fn test_continuation_folding() {
        let mut map = HeaderMap::new();
        map.append("WARC-Target-URI", "http://example.com/");
        map.add_continuation(b"  more");
        assert_eq!(map.get("WARC-Target-URI"), Some("http://example.com/ more".to_string()));
    }

    #[test]
    fn test_latin1_fallback() {
        let (s, ok) = decode_header_bytes(b"caf\xe9");
        assert_eq!(s, "café");
        assert!(!ok);
        let (s, ok) = decode_header_bytes("café".as_bytes());
        assert_eq!(s, "café");
        assert!(ok);
    }

    #[test]
    fn test_version_line() {
        assert_eq!(parse_version_line(b"WARC/1.0\r\n"), Some((1, 0)));
        assert_eq!(parse_version_line(b"WARC/0.17"), Some((0, 17)));
        assert_eq!(parse_version_line(b"WARC/1"), None);
        assert_eq!(parse_version_line(b"WARC/x.y"), None);
        assert_eq!(parse_version_line(b"warc/1.0"), None);
    }

    #[test]
    fn test_cached_fields_follow_edits() {
        let mut header = WarcHeader::with_version_line("WARC/1.1");
        header.append("WARC-Type", "resource");
        header.append("Content-Length", "12");
        assert_eq!(header.record_type(), Some(WarcRecordType::Resource));
        assert_eq!(header.content_length(), Some(12));
        header.set("Content-Length", "5");
        assert_eq!(header.content_length(), Some(5));
        header.remove("WARC-Type");
        assert_eq!(header.record_type(), None);
        assert_eq!(header.version(), Some((1, 1)));
    }
}
