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

use super::{ReaderOptions, WarcReader};
use crate::error::Result;
use crate::stream::ByteSource;

/// Prefix of every WARC version line.
pub const WARC_MAGIC: &[u8] = b"WARC/";

/// First two bytes of a gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const MAGIC_PEEK_LEN: usize = 16;


/// Whether the source starts with a WARC version line. Nothing is consumed.
///
/// Sources shorter than the magic bytes are not WARC files.
pub fn is_warc_file<R: Read>(source: &mut ByteSource<R>) -> io::Result<bool> {
    Ok(source.peek(MAGIC_PEEK_LEN)?.starts_with(WARC_MAGIC))
}

/// Whether the source starts with a gzip member. Nothing is consumed.
pub fn is_compressed<R: Read>(source: &mut ByteSource<R>) -> io::Result<bool> {
    Ok(source.peek(GZIP_MAGIC.len())? == GZIP_MAGIC)
}

/// Create a reader, detecting whether the input is gzip-compressed.
pub fn reader<R: Read>(source: R) -> Result<WarcReader<R>> {
    reader_with_options(source, ReaderOptions::default())
}

pub fn reader_with_options<R: Read>(source: R, options: ReaderOptions) -> Result<WarcReader<R>> {
    reader_at(source, 0, options)
}

/// Create a reader for a source that has already been positioned at `offset`, e.g. by
/// seeking to a record offset taken from an index. Record offsets are reported relative to
/// the start of the file.
pub fn reader_at<R: Read>(source: R, offset: u64, options: ReaderOptions) -> Result<WarcReader<R>> {
    let mut source = ByteSource::with_position(source, offset, options.buffer_size);
    let compressed = is_compressed(&mut source)?;
    tracing::debug!(offset, compressed, "Opening WARC reader");
    Ok(WarcReader::from_source(source, compressed, options))
}
