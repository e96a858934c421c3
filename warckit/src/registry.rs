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

//! Static tables of known WARC header fields, record types, and the policy governing
//! which field may appear in which record type.
//!
//! All codes are dense, starting at zero, so the policy can be stored as a plain
//! two-dimensional array. Name lookups go through lazily built maps that are never
//! mutated afterwards.

use std::collections::HashMap;
use std::sync::LazyLock;


/// WARC record type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarcRecordType {
    WarcInfo = 0,
    Response = 1,
    Resource = 2,
    Request = 3,
    Metadata = 4,
    Revisit = 5,
    Conversion = 6,
    Continuation = 7,
}

/// Number of known record types.
pub const RECORD_TYPE_COUNT: usize = 8;

/// Record type mask matching every known record type.
pub const ANY_RECORD_TYPE: u16 = (1 << RECORD_TYPE_COUNT) - 1;

pub const RECORD_TYPES: [WarcRecordType; RECORD_TYPE_COUNT] = [
    WarcRecordType::WarcInfo,
    WarcRecordType::Response,
    WarcRecordType::Resource,
    WarcRecordType::Request,
    WarcRecordType::Metadata,
    WarcRecordType::Revisit,
    WarcRecordType::Conversion,
    WarcRecordType::Continuation,
];

pub const RECORD_TYPE_NAMES: [&str; RECORD_TYPE_COUNT] = [
    "warcinfo",
    "response",
    "resource",
    "request",
    "metadata",
    "revisit",
    "conversion",
    "continuation",
];

impl WarcRecordType {
    pub fn as_str(&self) -> &'static str {
        RECORD_TYPE_NAMES[self.code()]
    }

    /// Dense table index of this record type.
    pub fn code(&self) -> usize {
        *self as usize
    }

    /// Bit flag of this record type for use in type masks.
    pub fn bit(&self) -> u16 {
        1 << (*self as u16)
    }

    pub fn matches_bitmask(&self, bitmask: u16) -> bool {
        self.bit() & bitmask != 0
    }

    /// Look up a record type name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        RECORD_TYPE_LOOKUP.get(name.trim().to_ascii_lowercase().as_str()).copied()
    }
}

impl TryFrom<usize> for WarcRecordType {
    type Error = &'static str;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        RECORD_TYPES.get(value).copied().ok_or("Invalid enum value.")
    }
}

impl TryFrom<&str> for WarcRecordType {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_name(value).ok_or("Invalid enum value.")
    }
}

impl From<WarcRecordType> for &'static str {
    fn from(value: WarcRecordType) -> Self {
        value.as_str()
    }
}

impl std::fmt::Display for WarcRecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Known WARC header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCode {
    WarcType = 0,
    RecordId = 1,
    WarcDate = 2,
    ContentLength = 3,
    ContentType = 4,
    ConcurrentTo = 5,
    BlockDigest = 6,
    PayloadDigest = 7,
    IpAddress = 8,
    RefersTo = 9,
    TargetUri = 10,
    Truncated = 11,
    WarcinfoId = 12,
    Filename = 13,
    Profile = 14,
    IdentifiedPayloadType = 15,
    SegmentOriginId = 16,
    SegmentNumber = 17,
    SegmentTotalLength = 18,
    RefersToTargetUri = 19,
    RefersToDate = 20,
}

/// Number of known header fields.
pub const FIELD_COUNT: usize = 21;

pub const FIELDS: [FieldCode; FIELD_COUNT] = [
    FieldCode::WarcType,
    FieldCode::RecordId,
    FieldCode::WarcDate,
    FieldCode::ContentLength,
    FieldCode::ContentType,
    FieldCode::ConcurrentTo,
    FieldCode::BlockDigest,
    FieldCode::PayloadDigest,
    FieldCode::IpAddress,
    FieldCode::RefersTo,
    FieldCode::TargetUri,
    FieldCode::Truncated,
    FieldCode::WarcinfoId,
    FieldCode::Filename,
    FieldCode::Profile,
    FieldCode::IdentifiedPayloadType,
    FieldCode::SegmentOriginId,
    FieldCode::SegmentNumber,
    FieldCode::SegmentTotalLength,
    FieldCode::RefersToTargetUri,
    FieldCode::RefersToDate,
];

pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "WARC-Type",
    "WARC-Record-ID",
    "WARC-Date",
    "Content-Length",
    "Content-Type",
    "WARC-Concurrent-To",
    "WARC-Block-Digest",
    "WARC-Payload-Digest",
    "WARC-IP-Address",
    "WARC-Refers-To",
    "WARC-Target-URI",
    "WARC-Truncated",
    "WARC-Warcinfo-ID",
    "WARC-Filename",
    "WARC-Profile",
    "WARC-Identified-Payload-Type",
    "WARC-Segment-Origin-ID",
    "WARC-Segment-Number",
    "WARC-Segment-Total-Length",
    "WARC-Refers-To-Target-URI",
    "WARC-Refers-To-Date",
];

impl FieldCode {
    /// Canonical spelling of the field name.
    pub fn name(&self) -> &'static str {
        FIELD_NAMES[self.code()]
    }

    pub fn code(&self) -> usize {
        *self as usize
    }

    /// Look up a field name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        FIELD_LOOKUP.get(name.trim().to_ascii_lowercase().as_str()).copied()
    }
}


/// Whether and how often a field may appear in a given record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPolicy {
    Mandatory,
    Optional,
    /// Optional and may occur more than once.
    Repeatable,
    /// Tolerated but not validated.
    Ignored,
    NotAllowed,
}

impl FieldPolicy {
    pub fn allows_duplicates(&self) -> bool {
        matches!(self, FieldPolicy::Repeatable | FieldPolicy::Ignored)
    }
}

use FieldPolicy::{Ignored as I, Mandatory as M, NotAllowed as N, Optional as O, Repeatable as R};

/// Field policy matrix, indexed by `[record type code][field code]`.
///
/// Columns follow [`FIELD_NAMES`], rows follow [`RECORD_TYPE_NAMES`].
pub static FIELD_POLICY: [[FieldPolicy; FIELD_COUNT]; RECORD_TYPE_COUNT] = [
    //  Type Id Date Len CType Conc BlkD PayD IP Ref URI Trunc Info File Prof IdPT SegO SegN SegT RTU RDate
    [M, M, M, M, O, N, O, N, N, N, N, O, N, O, N, N, N, O, N, N, N], // warcinfo
    [M, M, M, M, O, R, O, O, O, N, M, O, O, N, N, O, N, O, N, N, N], // response
    [M, M, M, M, O, R, O, O, O, N, M, O, O, N, N, O, N, O, N, N, N], // resource
    [M, M, M, M, O, R, O, O, O, N, M, O, O, N, N, O, N, O, N, N, N], // request
    [M, M, M, M, O, R, O, O, O, O, O, O, O, N, N, O, N, O, N, N, N], // metadata
    [M, M, M, M, O, R, O, O, O, O, M, O, O, N, M, O, N, O, N, O, O], // revisit
    [M, M, M, M, O, N, O, O, N, O, M, O, O, N, N, O, N, O, N, N, N], // conversion
    [M, M, M, M, N, N, O, O, N, N, M, O, O, N, N, I, M, M, O, N, N], // continuation
];

/// Policy of a known field in a known record type.
pub fn field_policy(record_type: WarcRecordType, field: FieldCode) -> FieldPolicy {
    FIELD_POLICY[record_type.code()][field.code()]
}

static FIELD_LOOKUP: LazyLock<HashMap<String, FieldCode>> = LazyLock::new(|| {
    FIELD_NAMES.iter()
        .zip(FIELDS)
        .map(|(name, code)| (name.to_ascii_lowercase(), code))
        .collect()
});

static RECORD_TYPE_LOOKUP: LazyLock<HashMap<&'static str, WarcRecordType>> = LazyLock::new(|| {
    RECORD_TYPE_NAMES.iter()
        .zip(RECORD_TYPES)
        .map(|(name, t)| (*name, t))
        .collect()
});


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_consistent() {
        assert_eq!(FIELDS.len(), FIELD_NAMES.len());
        assert_eq!(RECORD_TYPES.len(), RECORD_TYPE_NAMES.len());
        assert_eq!(FIELD_POLICY.len(), RECORD_TYPES.len());
        for row in FIELD_POLICY.iter() {
            assert_eq!(row.len(), FIELDS.len());
        }
        assert_eq!(FIELD_LOOKUP.len(), FIELD_COUNT);
        assert_eq!(RECORD_TYPE_LOOKUP.len(), RECORD_TYPE_COUNT);
    }

    #[test]
    fn test_codes_are_dense() {
        for (i, f) in FIELDS.iter().enumerate() {
            assert_eq!(f.code(), i);
            assert_eq!(FieldCode::from_name(FIELD_NAMES[i]), Some(*f));
        }
        for (i, t) in RECORD_TYPES.iter().enumerate() {
            assert_eq!(t.code(), i);
            assert_eq!(WarcRecordType::try_from(i), Ok(*t));
        }
        assert!(WarcRecordType::try_from(RECORD_TYPE_COUNT).is_err());
    }

    #[test]
    fn test_name_lookup_ignores_case() {
        assert_eq!(FieldCode::from_name("warc-record-id"), Some(FieldCode::RecordId));
        assert_eq!(FieldCode::from_name("CONTENT-LENGTH"), Some(FieldCode::ContentLength));
        assert_eq!(FieldCode::from_name("X-Custom"), None);
        assert_eq!(WarcRecordType::from_name("Response"), Some(WarcRecordType::Response));
        assert_eq!(WarcRecordType::try_from("bogus"), Err("Invalid enum value."));
    }

    #[test]
    fn test_every_type_requires_core_fields() {
        for t in RECORD_TYPES {
            for f in [FieldCode::WarcType, FieldCode::RecordId, FieldCode::WarcDate, FieldCode::ContentLength] {
                assert_eq!(field_policy(t, f), FieldPolicy::Mandatory, "{} / {}", t, f.name());
            }
        }
        assert_eq!(field_policy(WarcRecordType::Continuation, FieldCode::SegmentOriginId), FieldPolicy::Mandatory);
        assert_eq!(field_policy(WarcRecordType::Response, FieldCode::SegmentTotalLength), FieldPolicy::NotAllowed);
        assert_eq!(field_policy(WarcRecordType::Revisit, FieldCode::Profile), FieldPolicy::Mandatory);
    }

    #[test]
    fn test_bitmask() {
        let mask = WarcRecordType::Response.bit() | WarcRecordType::Request.bit();
        assert!(WarcRecordType::Response.matches_bitmask(mask));
        assert!(WarcRecordType::Request.matches_bitmask(mask));
        assert!(!WarcRecordType::WarcInfo.matches_bitmask(mask));
        assert!(WarcRecordType::Continuation.matches_bitmask(ANY_RECORD_TYPE));
    }
}
