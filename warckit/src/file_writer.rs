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

//! Writing records into a series of size-limited WARC files.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WriterConfig;
use crate::error::{Error, Result};
use crate::naming::FileNaming;
use crate::record::WarcRecord;
use crate::registry::{FieldCode, WarcRecordType};
use crate::writer::WarcWriter;

/// `Content-Type` of `warcinfo` blocks.
pub const WARC_FIELDS_CONTENT_TYPE: &str = "application/warc-fields";


/// Record writer that rolls over to a new file once the current one is full.
///
/// Files are only rolled between records, so a file may exceed the configured maximum
/// size by up to one record.
pub struct WarcFileWriter<N: FileNaming> {
    naming: N,
    config: WriterConfig,
    writer: Option<WarcWriter<BufWriter<File>>>,
    current_path: Option<PathBuf>,
    sequence: u64,
    files: Vec<PathBuf>,
    size_warning: bool,
}

impl<N: FileNaming> WarcFileWriter<N> {
    /// Create a file writer. No file is opened before the first record is written.
    pub fn new(naming: N, config: WriterConfig) -> Self {
        WarcFileWriter {
            naming,
            config,
            writer: None,
            current_path: None,
            sequence: 0,
            files: Vec::new(),
            size_warning: false,
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Path of the file currently written to.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// All files opened so far, in order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Size of the current file in bytes.
    pub fn current_size(&self) -> u64 {
        self.writer.as_ref().map(WarcWriter::offset).unwrap_or(0)
    }

    /// Write a record, starting a new file first if necessary.
    /// Returns the number of bytes the record occupies in the file.
    pub fn write_record(&mut self, record: &mut WarcRecord<'_>) -> Result<u64> {
        self.ensure_file()?;
        let writer = self.writer.as_mut().ok_or(Error::IllegalState("no output file open"))?;
        writer.write_record(record)
    }

    /// Flush and close the current file.
    pub fn close(mut self) -> Result<()> {
        self.finish_file()
    }

    fn ensure_file(&mut self) -> Result<()> {
        if self.writer.is_some() {
            let size = self.current_size();
            if size < self.config.max_file_size() {
                return Ok(());
            }
            if !self.naming.supports_multiple_files() {
                if !self.size_warning {
                    tracing::warn!(size, max_file_size = self.config.max_file_size(),
                                   "Output file exceeds maximum size, but naming policy allows only one file");
                    self.size_warning = true;
                }
                return Ok(());
            }
            self.finish_file()?;
            self.sequence += 1;
        }
        self.open_file()
    }

    fn open_file(&mut self) -> Result<()> {
        let name = self.naming.filename(self.sequence, self.config.compress());
        let path = match self.config.target_dir() {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };

        let mut warcinfo = if self.config.metadata().is_empty() {
            None
        } else {
            Some(self.warcinfo_record(&name)?)
        };

        let mut options = OpenOptions::new();
        options.write(true);
        if self.config.overwrite() {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = BufWriter::new(options.open(&path)?);
        let mut writer = if self.config.compress() {
            WarcWriter::new_compressed(file)
        } else {
            WarcWriter::new(file)
        };

        if let Some(warcinfo) = &mut warcinfo {
            if let Err(e) = writer.write_record(warcinfo).and_then(|_| writer.flush()) {
                drop(writer);
                if let Err(remove) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %remove, "Failed to remove incomplete WARC file");
                }
                return Err(e);
            }
        }

        tracing::info!(path = %path.display(), sequence = self.sequence, "Opened WARC output file");
        self.writer = Some(writer);
        self.files.push(path.clone());
        self.current_path = Some(path);
        Ok(())
    }

    fn finish_file(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let records = writer.records_written();
        let size = writer.offset();
        writer.close()?.flush()?;
        if let Some(path) = &self.current_path {
            tracing::info!(path = %path.display(), records, size, "Closed WARC output file");
        }
        Ok(())
    }

    /// `warcinfo` record listing the configured metadata.
    fn warcinfo_record(&self, filename: &str) -> Result<WarcRecord<'static>> {
        let mut block = String::new();
        for (key, value) in self.config.metadata() {
            let is_break = |c: char| c == '\r' || c == '\n';
            if key.is_empty() || key.contains(is_break) || key.contains(':') || value.contains(is_break) {
                return Err(Error::InvalidArgument(format!("malformed warcinfo field {:?}", key)));
            }
            block.push_str(key);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }

        let mut record = WarcRecord::new();
        record.init_headers(0, WarcRecordType::WarcInfo, None);
        record.header_mut().set(FieldCode::ContentType.name(), WARC_FIELDS_CONTENT_TYPE);
        record.header_mut().set(FieldCode::Filename.name(), filename);
        record.set_content(block.into_bytes())?;
        Ok(record)
    }
}
