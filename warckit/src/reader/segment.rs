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

use crate::diagnostics::{DiagnosisType, Diagnostics};
use crate::header::WarcHeader;
use crate::registry::{FieldCode, WarcRecordType};


/// Progress of a segmented capture spread over a first segment and its continuations.
#[derive(Debug, Default)]
pub(crate) struct SegmentState {
    origin_id: Option<String>,
    next_number: u64,
    accumulated: u64,
}

impl SegmentState {
    /// Correlate a record's segment fields with the capture currently in progress.
    pub(crate) fn check(&mut self, header: &WarcHeader, diagnostics: &mut Diagnostics) {
        let Some(number) = header.segment_number() else {
            return;
        };
        let subject = FieldCode::SegmentNumber.name();

        if header.record_type() != Some(WarcRecordType::Continuation) {
            if number != 1 {
                diagnostics.error(DiagnosisType::InvalidExpected, subject, [number.to_string(), "1".to_string()]);
                return;
            }
            if let Some(previous) = self.origin_id.take() {
                diagnostics.warning(DiagnosisType::Missing, "Segment continuation", [previous]);
            }
            if let Some(id) = header.record_id() {
                self.origin_id = Some(id.to_string());
                self.next_number = 2;
                self.accumulated = header.content_length().unwrap_or(0);
            }
            return;
        }

        if number <= 1 {
            diagnostics.error(DiagnosisType::InvalidExpected, subject, [number.to_string(), ">1".to_string()]);
            return;
        }

        let Some(origin_id) = self.origin_id.as_deref() else {
            diagnostics.warning(DiagnosisType::Missing, "Segment origin", header.segment_origin_id());
            return;
        };
        if header.segment_origin_id() != Some(origin_id) {
            diagnostics.warning(DiagnosisType::InvalidExpected, FieldCode::SegmentOriginId.name(),
                                [header.segment_origin_id().unwrap_or(""), origin_id]);
        }
        if number != self.next_number {
            diagnostics.warning(DiagnosisType::InvalidExpected, subject,
                                [number.to_string(), self.next_number.to_string()]);
        }
        self.next_number = number.saturating_add(1);
        let length = header.content_length().unwrap_or(0);
        self.accumulated = match self.accumulated.checked_add(length) {
            Some(n) => n,
            None => {
                diagnostics.warning(DiagnosisType::Invalid, "Segment length", [self.accumulated.to_string(), length.to_string()]);
                u64::MAX
            }
        };

        if let Some(total) = header.segment_total_length() {
            if total != self.accumulated {
                diagnostics.warning(DiagnosisType::InvalidExpected, FieldCode::SegmentTotalLength.name(),
                                    [total.to_string(), self.accumulated.to_string()]);
            }
            self.origin_id = None;
        }
    }

    /// Report a capture that never received its last segment.
    pub(crate) fn finish(&mut self, diagnostics: &mut Diagnostics) {
        if let Some(origin_id) = self.origin_id.take() {
            diagnostics.warning(DiagnosisType::Missing, "Segment continuation", [origin_id]);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn header(fields: &[(&str, &str)]) -> WarcHeader {
        let mut header = WarcHeader::with_version_line("WARC/1.1");
        for (k, v) in fields {
            header.append(k, v);
        }
        header
    }

    #[test]
    fn test_complete_set() {
        let mut state = SegmentState::default();
        let mut diagnostics = Diagnostics::new();
        state.check(&header(&[
            ("WARC-Type", "response"),
            ("WARC-Record-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "1"),
            ("Content-Length", "10"),
        ]), &mut diagnostics);
        state.check(&header(&[
            ("WARC-Type", "continuation"),
            ("WARC-Record-ID", "<urn:test:2>"),
            ("WARC-Segment-Origin-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "2"),
            ("WARC-Segment-Total-Length", "15"),
            ("Content-Length", "5"),
        ]), &mut diagnostics);
        state.finish(&mut diagnostics);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_misplaced_numbers_are_errors() {
        let mut state = SegmentState::default();
        let mut diagnostics = Diagnostics::new();
        state.check(&header(&[("WARC-Type", "continuation"), ("WARC-Segment-Number", "1")]), &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 1);
        state.check(&header(&[("WARC-Type", "response"), ("WARC-Segment-Number", "2")]), &mut diagnostics);
        assert_eq!(diagnostics.errors().len(), 2);
        assert!(diagnostics.warnings().is_empty());
    }

    #[test]
    fn test_anomalies_are_warnings() {
        let mut state = SegmentState::default();
        let mut diagnostics = Diagnostics::new();
        state.check(&header(&[
            ("WARC-Type", "continuation"),
            ("WARC-Segment-Origin-ID", "<urn:test:0>"),
            ("WARC-Segment-Number", "2"),
        ]), &mut diagnostics);
        assert!(diagnostics.has_warning(DiagnosisType::Missing, "Segment origin"));

        state.check(&header(&[
            ("WARC-Type", "resource"),
            ("WARC-Record-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "1"),
        ]), &mut diagnostics);
        state.check(&header(&[
            ("WARC-Type", "continuation"),
            ("WARC-Segment-Origin-ID", "<urn:test:9>"),
            ("WARC-Segment-Number", "3"),
        ]), &mut diagnostics);
        assert!(diagnostics.has_warning(DiagnosisType::InvalidExpected, "WARC-Segment-Origin-ID"));
        assert!(diagnostics.has_warning(DiagnosisType::InvalidExpected, "WARC-Segment-Number"));

        state.finish(&mut diagnostics);
        assert!(diagnostics.has_warning(DiagnosisType::Missing, "Segment continuation"));
        assert!(diagnostics.errors().is_empty());
    }

    #[test]
    fn test_accumulated_length_overflow() {
        let mut state = SegmentState::default();
        let mut diagnostics = Diagnostics::new();
        state.check(&header(&[
            ("WARC-Type", "response"),
            ("WARC-Record-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "1"),
            ("Content-Length", "18446744073709551615"),
        ]), &mut diagnostics);
        state.check(&header(&[
            ("WARC-Type", "continuation"),
            ("WARC-Record-ID", "<urn:test:2>"),
            ("WARC-Segment-Origin-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "2"),
            ("Content-Length", "1"),
        ]), &mut diagnostics);
        state.check(&header(&[
            ("WARC-Type", "continuation"),
            ("WARC-Record-ID", "<urn:test:3>"),
            ("WARC-Segment-Origin-ID", "<urn:test:1>"),
            ("WARC-Segment-Number", "18446744073709551615"),
            ("WARC-Segment-Total-Length", "1"),
            ("Content-Length", "1"),
        ]), &mut diagnostics);
        assert!(diagnostics.has_warning(DiagnosisType::Invalid, "Segment length"));
        assert!(!diagnostics.has_errors());
    }
}
