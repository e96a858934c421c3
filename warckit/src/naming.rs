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

//! Output file naming policies.

use std::path::Path;

use crate::error::{Error, Result};

/// Extension of uncompressed WARC files.
pub const WARC_EXTENSION: &str = ".warc";

/// Extension of gzip-compressed WARC files.
pub const WARC_GZ_EXTENSION: &str = ".warc.gz";


/// Decides what output files are called.
pub trait FileNaming {
    /// Whether the policy produces a distinct name per sequence number.
    fn supports_multiple_files(&self) -> bool;

    /// File name for the given zero-based sequence number.
    fn filename(&self, sequence: u64, compressed: bool) -> String;
}


/// A single, fixed file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFileNaming {
    name: String,
}

impl SingleFileNaming {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("file name must not be empty".to_string()));
        }
        Ok(SingleFileNaming { name })
    }

    /// Use the final component of a path as the file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => Self::new(name),
            None => Err(Error::InvalidArgument(format!("path has no file name: {}", path.display()))),
        }
    }
}

impl FileNaming for SingleFileNaming {
    fn supports_multiple_files(&self) -> bool {
        false
    }

    fn filename(&self, _sequence: u64, _compressed: bool) -> String {
        self.name.clone()
    }
}


/// Names of the form `{prefix}-{yyyyMMddHHmmss}-{sequence:05}-{hostname}.warc[.gz]`.
///
/// The timestamp is taken once when the policy is created, so all files of one
/// series share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceNaming {
    prefix: String,
    timestamp: String,
    hostname: String,
}

impl SequenceNaming {
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.trim().is_empty() {
            return Err(Error::InvalidArgument("file name prefix must not be empty".to_string()));
        }
        Ok(SequenceNaming {
            prefix,
            timestamp: chrono::Utc::now().format("%Y%m%d%H%M%S").to_string(),
            hostname: local_hostname(),
        })
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        self.timestamp = timestamp.format("%Y%m%d%H%M%S").to_string();
        self
    }
}

impl FileNaming for SequenceNaming {
    fn supports_multiple_files(&self) -> bool {
        true
    }

    fn filename(&self, sequence: u64, compressed: bool) -> String {
        let extension = if compressed { WARC_GZ_EXTENSION } else { WARC_EXTENSION };
        format!("{}-{}-{:05}-{}{}", self.prefix, self.timestamp, sequence, self.hostname, extension)
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.trim().to_string()))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
