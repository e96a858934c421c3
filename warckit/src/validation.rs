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

//! Header field validation against the field registry.
//!
//! Validation never fails. Every violation becomes a [`Diagnosis`](crate::Diagnosis) and
//! the cached field values are filled from the first valid occurrence of each field.

use std::net::IpAddr;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::diagnostics::{DiagnosisType, Diagnostics};
use crate::digest::DigestValue;
use crate::header::{decode_header_bytes, FieldCache, WarcHeader};
use crate::registry::{field_policy, FieldCode, FieldPolicy, WarcRecordType, FIELDS, FIELD_COUNT};

const TRUNCATED_REASONS: [&str; 4] = ["length", "time", "disconnect", "unspecified"];


/// Validate all header fields and rebuild the cached field values.
pub(crate) fn index_fields(header: &mut WarcHeader, diagnostics: &mut Diagnostics) {
    let mut cache = FieldCache::default();

    let lines: Vec<(Option<FieldCode>, String, String)> = header.fields()
        .raw_items()
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| {
            let name = decode_header_bytes(k).0;
            (FieldCode::from_name(&name), name, decode_header_bytes(v).0)
        })
        .collect();

    // The record type decides the policy for all other fields, so resolve it first
    if let Some((_, _, value)) = lines.iter().find(|(c, _, _)| *c == Some(FieldCode::WarcType)) {
        let name = value.trim();
        cache.record_type_name = Some(name.to_string());
        cache.record_type = WarcRecordType::from_name(name);
        if cache.record_type.is_none() {
            diagnostics.warning(DiagnosisType::Unknown, FieldCode::WarcType.name(), [name]);
        }
    }
    let record_type = cache.record_type;

    let mut seen = [0usize; FIELD_COUNT];
    for (code, name, value) in &lines {
        let Some(code) = *code else {
            diagnostics.warning(DiagnosisType::Unknown, "Header field", [name.as_str()]);
            continue;
        };
        seen[code.code()] += 1;
        if seen[code.code()] > 1 {
            if !allows_duplicates(record_type, code) {
                diagnostics.error(DiagnosisType::Duplicate, code.name(), [value.as_str()]);
                continue;
            }
            if code != FieldCode::ConcurrentTo {
                continue;
            }
        }
        index_value(&mut cache, code, value.trim(), diagnostics);
    }

    match record_type {
        Some(t) => {
            for field in FIELDS {
                let count = seen[field.code()];
                match field_policy(t, field) {
                    FieldPolicy::Mandatory if count == 0 => {
                        diagnostics.error(DiagnosisType::Missing, field.name(), None::<String>);
                    }
                    FieldPolicy::NotAllowed if count > 0 => {
                        diagnostics.error(DiagnosisType::UndesiredData, field.name(), [t.as_str()]);
                    }
                    _ => {}
                }
            }
            if field_policy(t, FieldCode::ContentType) != FieldPolicy::NotAllowed
                && cache.content_length.unwrap_or(0) > 0
                && seen[FieldCode::ContentType.code()] == 0 {
                diagnostics.warning(DiagnosisType::RecommendedMissing, FieldCode::ContentType.name(), None::<String>);
            }
        }
        None => {
            // Without a known type only the fields mandatory for every type can be checked
            for field in [FieldCode::WarcType, FieldCode::RecordId, FieldCode::WarcDate, FieldCode::ContentLength] {
                if seen[field.code()] == 0 {
                    diagnostics.error(DiagnosisType::Missing, field.name(), None::<String>);
                }
            }
        }
    }

    header.cache = cache;
}

fn allows_duplicates(record_type: Option<WarcRecordType>, field: FieldCode) -> bool {
    match record_type {
        Some(t) => field_policy(t, field).allows_duplicates(),
        None => field == FieldCode::ConcurrentTo,
    }
}

fn index_value(cache: &mut FieldCache, code: FieldCode, value: &str, diagnostics: &mut Diagnostics) {
    let subject = code.name();
    let invalid = |diagnostics: &mut Diagnostics| diagnostics.error(DiagnosisType::InvalidEncoding, subject, [value]);

    match code {
        // Resolved up front
        FieldCode::WarcType => {}
        FieldCode::RecordId => match parse_bracketed_uri(value) {
            Some(_) => cache.record_id = Some(value.to_string()),
            None => invalid(diagnostics),
        },
        FieldCode::WarcDate => match parse_warc_date(value) {
            Some(d) => cache.date = Some(d),
            None => invalid(diagnostics),
        },
        FieldCode::ContentLength => match parse_integer(value) {
            Some(n) => cache.content_length = Some(n),
            None => invalid(diagnostics),
        },
        FieldCode::ContentType => match is_content_type(value) {
            true => cache.content_type = Some(value.to_string()),
            false => invalid(diagnostics),
        },
        FieldCode::ConcurrentTo => match parse_bracketed_uri(value) {
            Some(_) => cache.concurrent_to.push(value.to_string()),
            None => invalid(diagnostics),
        },
        FieldCode::BlockDigest | FieldCode::PayloadDigest => {
            let Some(digest) = DigestValue::parse(value) else {
                invalid(diagnostics);
                return;
            };
            if digest.digest_algorithm().is_none() {
                diagnostics.warning(DiagnosisType::Unknown, subject, [digest.algorithm()]);
            } else if !digest.is_decoded() {
                invalid(diagnostics);
            }
            if code == FieldCode::BlockDigest {
                cache.block_digest = Some(digest);
            } else {
                cache.payload_digest = Some(digest);
            }
        }
        FieldCode::IpAddress => match value.parse::<IpAddr>() {
            Ok(ip) => cache.ip_address = Some(ip),
            Err(_) => invalid(diagnostics),
        },
        FieldCode::RefersTo => match parse_bracketed_uri(value) {
            Some(_) => cache.refers_to = Some(value.to_string()),
            None => invalid(diagnostics),
        },
        FieldCode::TargetUri => match is_uri(unbracket(value)) {
            true => cache.target_uri = Some(unbracket(value).to_string()),
            false => invalid(diagnostics),
        },
        FieldCode::Truncated => {
            if !TRUNCATED_REASONS.contains(&value.to_ascii_lowercase().as_str()) {
                diagnostics.warning(DiagnosisType::InvalidExpected, subject, [value.to_string(), TRUNCATED_REASONS.join("|")]);
            }
            cache.truncated = Some(value.to_string());
        }
        FieldCode::WarcinfoId => match parse_bracketed_uri(value) {
            Some(_) => cache.warcinfo_id = Some(value.to_string()),
            None => invalid(diagnostics),
        },
        FieldCode::Filename => {
            if value.is_empty() {
                invalid(diagnostics);
            } else {
                cache.filename = Some(value.to_string());
            }
        }
        FieldCode::Profile => match is_uri(unbracket(value)) {
            true => cache.profile = Some(unbracket(value).to_string()),
            false => invalid(diagnostics),
        },
        FieldCode::IdentifiedPayloadType => {
            if !is_content_type(value) {
                invalid(diagnostics);
            }
        }
        FieldCode::SegmentOriginId => match parse_bracketed_uri(value) {
            Some(_) => cache.segment_origin_id = Some(value.to_string()),
            None => invalid(diagnostics),
        },
        FieldCode::SegmentNumber => match parse_integer(value) {
            Some(0) => diagnostics.error(DiagnosisType::InvalidExpected, subject, [value, ">0"]),
            Some(n) => cache.segment_number = Some(n),
            None => invalid(diagnostics),
        },
        FieldCode::SegmentTotalLength => match parse_integer(value) {
            Some(n) => cache.segment_total_length = Some(n),
            None => invalid(diagnostics),
        },
        FieldCode::RefersToTargetUri => {
            if !is_uri(unbracket(value)) {
                invalid(diagnostics);
            }
        }
        FieldCode::RefersToDate => {
            if parse_warc_date(value).is_none() {
                invalid(diagnostics);
            }
        }
    }
}

/// Parse a W3C ISO-8601 UTC timestamp such as `2024-01-31T12:00:00Z`.
///
/// Fractional seconds are accepted.
pub fn parse_warc_date(value: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.fZ"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|d| d.and_utc())
}

/// Format a timestamp the way `WARC-Date` expects it.
pub fn format_warc_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_integer(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Strip the angle brackets of a `<uri>` value and check the URI.
fn parse_bracketed_uri(value: &str) -> Option<&str> {
    let uri = value.strip_prefix('<')?.strip_suffix('>')?;
    is_uri(uri).then_some(uri)
}

fn unbracket(value: &str) -> &str {
    value.strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
}

/// Minimal absolute URI check: a scheme followed by `:` and no whitespace.
fn is_uri(value: &str) -> bool {
    let Some((scheme, rest)) = value.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && !rest.is_empty() && !value.contains(|c: char| c.is_whitespace() || c.is_control())
}

fn is_content_type(value: &str) -> bool {
    let media_type = value.split(';').next().unwrap_or("").trim();
    match media_type.split_once('/') {
        Some((t, s)) => is_token(t) && is_token(s),
        None => false,
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b))
}
