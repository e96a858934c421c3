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

//! Validating WARC reader and writer.
//!
//! Records are read one at a time from plain or per-record gzip-compressed input.
//! Malformed input does not abort parsing; findings are collected as [`Diagnostics`]
//! on the record they belong to.
//!
//! ```ignore
//! let mut reader = warckit::reader(File::open("crawl.warc.gz")?)?;
//! while let Some(mut record) = reader.next_record()? {
//!     let body = record.read_payload_to_end()?;
//!     record.close()?;
//!     for error in record.diagnostics().errors() {
//!         eprintln!("{}: {}", record.offset(), error);
//!     }
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod digest;
pub mod error;
pub mod file_writer;
pub mod header;
pub mod naming;
pub mod reader;
pub mod record;
pub mod registry;
pub mod stream;
pub mod validation;
pub mod writer;

pub use config::{WriterConfig, DEFAULT_MAX_FILE_SIZE};
pub use diagnostics::{Diagnosis, DiagnosisType, Diagnostics};
pub use digest::{DigestAlgorithm, DigestEncoding, DigestValue};
pub use error::{Error, Result};
pub use file_writer::WarcFileWriter;
pub use header::{HeaderMap, WarcHeader};
pub use naming::{FileNaming, SequenceNaming, SingleFileNaming};
pub use reader::{is_compressed, is_warc_file, reader, reader_at, reader_with_options, ReaderOptions, Records, WarcReader};
pub use record::{Payload, WarcRecord};
pub use registry::{FieldCode, FieldPolicy, WarcRecordType, ANY_RECORD_TYPE};
pub use stream::ByteSource;
pub use writer::WarcWriter;
