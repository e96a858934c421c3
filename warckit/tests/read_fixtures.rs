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

use std::io::Cursor;

use warckit::{is_warc_file, ByteSource, DiagnosisType, WarcReader, WarcRecordType};

fn record(fields: &[(&str, &str)], body: &str) -> String {
    let mut out = String::from("WARC/1.0\r\n");
    for (name, value) in fields {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n\r\n{}\r\n\r\n", body.len(), body));
    out
}

/// Error counts of all records, closing each record before counting.
fn error_counts(data: &[u8]) -> (Vec<usize>, WarcReader<Cursor<Vec<u8>>>) {
    let mut reader = WarcReader::new(Cursor::new(data.to_vec()));
    let mut counts = Vec::new();
    while let Some(mut record) = reader.next_record().unwrap() {
        record.close().unwrap();
        counts.push(record.diagnostics().errors().len());
    }
    (counts, reader)
}

#[test]
fn magic_detection() {
    let full = record(&[("WARC-Type", "warcinfo")], "");
    for (input, expected) in [
        (full.as_bytes(), true),
        (&b"WARC/1.0"[..], true),
        (&b"WARC/"[..], true),
        (&b"warc/1.0"[..], false),
        (&b"Warc/1.0"[..], false),
        (&b"WARC"[..], false),
        (&b"WAR"[..], false),
        (&b""[..], false),
        (&b" WARC/1.0"[..], false),
    ] {
        let mut source = ByteSource::new(Cursor::new(input.to_vec()));
        assert_eq!(is_warc_file(&mut source).unwrap(), expected, "{:?}", String::from_utf8_lossy(input));
        assert_eq!(source.position(), 0);
        let mut rest = Vec::new();
        std::io::Read::read_to_end(&mut source, &mut rest).unwrap();
        assert_eq!(rest, input);
    }
}

#[test]
fn garbage_without_record() {
    let (counts, reader) = error_counts(b"\r\n\r\nsome data\r\nmore data\r\n");
    assert!(counts.is_empty());
    let diagnostics = reader.diagnostics();
    assert_eq!(diagnostics.errors().len(), 3, "{:?}", diagnostics);
    assert_eq!(diagnostics.warnings().len(), 0);
    assert!(diagnostics.has_error(DiagnosisType::Invalid, "Data before WARC version"));
    assert!(diagnostics.has_error(DiagnosisType::Invalid, "Empty lines before WARC version"));
    assert!(diagnostics.has_error(DiagnosisType::ErrorExpected, "WARC file"));
}

#[test]
fn empty_input() {
    let (counts, reader) = error_counts(b"");
    assert!(counts.is_empty());
    assert!(reader.diagnostics().is_empty());
}

#[test]
fn garbage_before_record_is_reported_on_record() {
    let mut data = b"\r\nleftover\r\n".to_vec();
    data.extend_from_slice(record(&[
        ("WARC-Type", "metadata"),
        ("WARC-Record-ID", "<urn:uuid:6b1f4a5e-41a4-4f3c-8d3e-2d2a5a2c9e01>"),
        ("WARC-Date", "2017-03-06T04:03:53Z"),
        ("Content-Type", "text/plain"),
    ], "x").as_bytes());

    let mut reader = WarcReader::new(Cursor::new(data));
    let mut record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.offset(), 12);
    record.close().unwrap();
    assert_eq!(record.diagnostics().errors().len(), 2, "{:?}", record.diagnostics());
    drop(record);
    assert!(reader.next_record().unwrap().is_none());
    assert!(reader.diagnostics().is_empty());
}

#[test]
fn segmented_continuation_fixture() {
    let first = record(&[
        ("WARC-Type", "continuation"),
        ("WARC-Record-ID", "<urn:uuid:70653950-a77f-b212-e434-7a7c6ec909ef>"),
        ("WARC-Date", "2006-09-19T17:20:24Z"),
        ("WARC-Target-URI", "http://www.archive.org/images/logoc.jpg"),
        ("WARC-Segment-Origin-ID", "<urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac4>"),
        ("WARC-Segment-Number", "1"),
    ], "first part");
    let second = record(&[
        ("WARC-Type", "continuation"),
        ("WARC-Record-ID", "<urn:uuid:70653950-a77f-b212-e434-7a7c6ec909f0>"),
        ("WARC-Date", "2006-09-19T17:20:24Z"),
        ("WARC-Target-URI", "http://www.archive.org/images/logoc.jpg"),
        ("WARC-Segment-Origin-ID", "<urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac4>"),
        ("WARC-Segment-Number", "2"),
        ("WARC-Segment-Total-Length", "21"),
    ], "second part");

    let (counts, reader) = error_counts((first + &second).as_bytes());
    assert_eq!(counts, vec![1, 0]);
    assert_eq!(reader.records_read(), 2);
}

#[test]
fn segmented_response_fixture() {
    let first = record(&[
        ("WARC-Type", "response"),
        ("WARC-Record-ID", "<urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac4>"),
        ("WARC-Date", "2006-09-19T17:20:24Z"),
        ("WARC-Target-URI", "http://www.archive.org/images/logoc.jpg"),
        ("Content-Type", "application/http; msgtype=response"),
        ("WARC-Segment-Number", "1"),
    ], "HTTP/1.1 200 OK\r\n\r\nabc");
    let second = record(&[
        ("WARC-Type", "response"),
        ("WARC-Record-ID", "<urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac5>"),
        ("WARC-Date", "2006-09-19T17:20:24Z"),
        ("WARC-Target-URI", "http://www.archive.org/images/logoc.jpg"),
        ("Content-Type", "application/http; msgtype=response"),
        ("WARC-Segment-Number", "2"),
    ], "HTTP/1.1 200 OK\r\n\r\ndef");

    let (counts, reader) = error_counts((first + &second).as_bytes());
    assert_eq!(counts, vec![0, 1]);
    assert!(reader.diagnostics().has_warning(DiagnosisType::Missing, "Segment continuation"));
    assert!(reader.diagnostics().errors().is_empty());
}

#[test]
fn record_after_bad_record_is_still_read() {
    let bad = "WARC/1.0\r\nWARC-Type: resource\r\nbroken line\r\n\r\n\r\n\r\n";
    let good = record(&[
        ("WARC-Type", "resource"),
        ("WARC-Record-ID", "<urn:uuid:6b1f4a5e-41a4-4f3c-8d3e-2d2a5a2c9e02>"),
        ("WARC-Date", "2017-03-06T04:03:53Z"),
        ("WARC-Target-URI", "file:///tmp/x"),
        ("Content-Type", "text/plain"),
    ], "payload");

    let mut reader = WarcReader::new(Cursor::new((bad.to_string() + &good).into_bytes()));
    let mut types = Vec::new();
    let mut errors = Vec::new();
    while let Some(mut record) = reader.next_record().unwrap() {
        types.push(record.record_type());
        record.close().unwrap();
        errors.push(record.diagnostics().has_errors());
    }
    assert_eq!(types, vec![Some(WarcRecordType::Resource), Some(WarcRecordType::Resource)]);
    assert_eq!(errors, vec![true, false]);
}

#[test]
fn oversized_segment_lengths_do_not_overflow() {
    let members: Vec<Vec<u8>> = [
        "WARC/1.1\r\nWARC-Type: response\r\n\
         WARC-Record-ID: <urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac4>\r\n\
         WARC-Segment-Number: 1\r\nContent-Length: 18446744073709551615\r\n\r\nab",
        "WARC/1.1\r\nWARC-Type: continuation\r\n\
         WARC-Record-ID: <urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac5>\r\n\
         WARC-Segment-Origin-ID: <urn:uuid:39509228-ae2f-11b2-763a-aa4c6ec90ac4>\r\n\
         WARC-Segment-Number: 2\r\nWARC-Segment-Total-Length: 3\r\nContent-Length: 1\r\n\r\nc\r\n\r\n",
    ].iter().map(|m| {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, m.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }).collect();

    let mut reader = WarcReader::new_compressed(Cursor::new(members.concat()));
    let mut first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.read_payload_to_end().unwrap(), b"ab");
    first.close().unwrap();
    assert!(first.diagnostics().has_error(DiagnosisType::UndesiredData, "Content-Length"));
    drop(first);

    let mut second = reader.next_record().unwrap().unwrap();
    second.close().unwrap();
    assert!(second.diagnostics().has_warning(DiagnosisType::Invalid, "Segment length"));
    drop(second);
    assert!(reader.next_record().unwrap().is_none());
}
