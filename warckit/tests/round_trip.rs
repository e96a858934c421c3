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

use std::io::{Cursor, Read};

use warckit::{
    reader, DigestAlgorithm, DigestEncoding, Error, SequenceNaming, SingleFileNaming, WarcFileWriter,
    WarcReader, WarcRecord, WarcRecordType, WarcWriter, WriterConfig,
};

fn resource(body: &[u8], uri: &str) -> WarcRecord<'static> {
    let mut record = WarcRecord::new();
    record.init_headers(0, WarcRecordType::Resource, None);
    record.header_mut().set("WARC-Target-URI", uri);
    record.header_mut().set("Content-Type", "application/octet-stream");
    record.set_content(body.to_vec()).unwrap();
    record.set_block_digest(DigestAlgorithm::Sha1, DigestEncoding::Base32).unwrap();
    record
}

fn write_all(compressed: bool, records: &mut [WarcRecord<'static>]) -> (Vec<u8>, Vec<u64>) {
    let mut writer = if compressed {
        WarcWriter::new_compressed(Vec::new())
    } else {
        WarcWriter::new(Vec::new())
    };
    let lengths = records.iter_mut().map(|r| writer.write_record(r).unwrap()).collect();
    (writer.close().unwrap(), lengths)
}

fn check_round_trip(compressed: bool) {
    let bodies: [&[u8]; 3] = [b"first body", b"", &[0u8, 1, 2, 255, 13, 10, 13, 10]];
    let mut records: Vec<_> = bodies.iter()
        .enumerate()
        .map(|(i, b)| resource(b, &format!("http://example.com/{}", i)))
        .collect();
    let (data, lengths) = write_all(compressed, &mut records);

    let mut reader = reader(Cursor::new(data.clone())).unwrap();
    assert_eq!(reader.is_compressed(), compressed);

    let mut offset = 0;
    for (i, expected) in records.iter().enumerate() {
        let mut record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.offset(), offset);
        assert_eq!(record.record_id(), expected.record_id());
        assert_eq!(record.header().target_uri(), expected.header().target_uri());
        assert_eq!(record.read_payload_to_end().unwrap(), bodies[i]);
        record.close().unwrap();
        assert!(record.diagnostics().is_empty(), "record {}: {:?}", i, record.diagnostics());
        drop(record);
        offset += lengths[i];
    }
    assert!(reader.next_record().unwrap().is_none());
    assert_eq!(reader.offset(), data.len() as u64);
    assert!(reader.diagnostics().is_empty());
}

#[test]
fn round_trip_plain() {
    check_round_trip(false);
}

#[test]
fn round_trip_gzip() {
    check_round_trip(true);
}

#[test]
fn corrupted_block_is_detected() {
    let mut records = [resource(b"original content", "http://example.com/")];
    let (mut data, _) = write_all(false, &mut records);
    let pos = data.windows(8).position(|w| w == b"original").unwrap();
    data[pos] = b'O';

    let mut reader = WarcReader::new(Cursor::new(data));
    let mut record = reader.next_record().unwrap().unwrap();
    record.close().unwrap();
    assert_eq!(record.diagnostics().errors().len(), 1);
    assert_eq!(record.diagnostics().errors()[0].subject(), "WARC-Block-Digest");
}

#[test]
fn streamed_copy_between_readers_and_writers() {
    let mut records = [resource(b"a", "http://example.com/a"), resource(b"bc", "http://example.com/b")];
    let (plain, _) = write_all(false, &mut records);

    let mut input = WarcReader::new(Cursor::new(plain.clone()));
    let mut output = WarcWriter::new_compressed(Vec::new());
    while let Some(mut record) = input.next_record().unwrap() {
        output.write_record(&mut record).unwrap();
    }
    let compressed = output.close().unwrap();

    let mut uncompressed = Vec::new();
    flate2::read::MultiGzDecoder::new(&compressed[..]).read_to_end(&mut uncompressed).unwrap();
    assert_eq!(uncompressed, plain);
}

#[test]
fn iterator_yields_frozen_records() {
    let mut records = [resource(b"one", "http://example.com/1"), resource(b"two", "http://example.com/2")];
    let (data, _) = write_all(true, &mut records);

    let mut reader = WarcReader::new_compressed(Cursor::new(data));
    let frozen: Vec<WarcRecord<'static>> = reader.records().collect();
    assert_eq!(frozen.len(), 2);
    assert_eq!(frozen[1].content(), Some(&b"two"[..]));
    assert!(frozen.iter().all(|r| r.diagnostics().is_empty() && r.is_frozen()));

    let mut records = reader.records();
    assert!(!records.has_next());
    assert!(matches!(records.next_record(), Err(Error::NoSuchElement)));
    assert!(records.last_error().is_none());
}

#[test]
fn trailing_data_in_gzip_member() {
    let mut member = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    std::io::Write::write_all(&mut member, b"WARC/1.1\r\nWARC-Type: metadata\r\nContent-Length: 1\r\n\r\nx\r\n\r\nextra").unwrap();
    let data = member.finish().unwrap();

    let mut reader = WarcReader::new_compressed(Cursor::new(data));
    let mut record = reader.next_record().unwrap().unwrap();
    record.close().unwrap();
    assert!(record.diagnostics().has_error(warckit::DiagnosisType::UndesiredData, "Trailing data"));
}

#[test]
fn rotating_file_writer() {
    let dir = tempfile::tempdir().unwrap();
    let config = WriterConfig::default()
        .with_target_dir(dir.path())
        .with_compress(true)
        .with_max_file_size(1)
        .with_metadata_field("software", "warckit");
    let naming = SequenceNaming::new("test").unwrap().with_hostname("localhost");
    let mut writer = WarcFileWriter::new(naming, config);
    for i in 0..3 {
        writer.write_record(&mut resource(b"payload", &format!("http://example.com/{}", i))).unwrap();
    }
    let files = writer.files().to_vec();
    writer.close().unwrap();

    assert_eq!(files.len(), 3);
    for (i, path) in files.iter().enumerate() {
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("test-"));
        assert!(name.ends_with(&format!("-{:05}-localhost.warc.gz", i)), "{}", name);

        let mut reader = reader(std::fs::File::open(path).unwrap()).unwrap();
        let records: Vec<_> = reader.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type(), Some(WarcRecordType::WarcInfo));
        assert_eq!(records[0].header().filename(), Some(name));
        assert_eq!(records[0].content(), Some(&b"software: warckit\r\n"[..]));
        assert_eq!(records[1].record_type(), Some(WarcRecordType::Resource));
        assert!(records.iter().all(|r| r.diagnostics().errors().is_empty()));
    }
}

#[test]
fn single_file_writer_never_rotates() {
    let dir = tempfile::tempdir().unwrap();
    let config = WriterConfig::default().with_target_dir(dir.path()).with_max_file_size(1);
    let mut writer = WarcFileWriter::new(SingleFileNaming::new("only.warc").unwrap(), config);
    for _ in 0..3 {
        writer.write_record(&mut resource(b"payload", "http://example.com/")).unwrap();
    }
    assert_eq!(writer.files().len(), 1);
    writer.close().unwrap();

    let mut reader = reader(std::fs::File::open(dir.path().join("only.warc")).unwrap()).unwrap();
    assert_eq!(reader.records().count(), 3);
}
