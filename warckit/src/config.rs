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

//! Output file writer configuration.
//!
//! ```ignore
//! let config = WriterConfig::default()
//!     .with_target_dir("/data/crawl")
//!     .with_compress(true)
//!     .with_max_file_size(256 * 1024 * 1024);
//!
//! let config = WriterConfig::from_toml_str(r#"
//!     target_dir = "/data/crawl"
//!     compress = true
//!
//!     [metadata]
//!     operator = "Archive Team"
//! "#)?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Default size at which a new output file is started (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_073_741_824;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Output directory, current directory if unset.
    target_dir: Option<PathBuf>,
    /// Compress every record into its own gzip member.
    compress: bool,
    /// Roll to a new file once the current one has reached this size in bytes.
    max_file_size: u64,
    /// Replace existing files instead of failing.
    overwrite: bool,
    /// Fields of the `warcinfo` record at the start of every file.
    metadata: BTreeMap<String, String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            target_dir: None,
            compress: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            overwrite: false,
            metadata: BTreeMap::new(),
        }
    }
}

impl WriterConfig {
    /// Parse a TOML configuration document. Missing keys take their default values.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }

    pub fn target_dir(&self) -> Option<&Path> {
        self.target_dir.as_deref()
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn with_target_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a single metadata field.
    pub fn with_metadata_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.target_dir(), None);
        assert!(!config.compress());
        assert_eq!(config.max_file_size(), DEFAULT_MAX_FILE_SIZE);
        assert!(!config.overwrite());
        assert!(config.metadata().is_empty());
    }

    #[test]
    fn test_from_toml() {
        let config = WriterConfig::from_toml_str(r#"
            target_dir = "/data/out"
            compress = true

            [metadata]
            software = "warckit"
            operator = "test"
        "#).unwrap();
        assert_eq!(config.target_dir(), Some(Path::new("/data/out")));
        assert!(config.compress());
        assert_eq!(config.max_file_size(), DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.metadata().get("software").map(String::as_str), Some("warckit"));
        assert_eq!(config.metadata().len(), 2);

        assert_eq!(WriterConfig::from_toml_str("").unwrap(), WriterConfig::default());
        assert!(matches!(WriterConfig::from_toml_str("compress = 3"), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = WriterConfig::default()
            .with_target_dir("out")
            .with_overwrite(true)
            .with_max_file_size(10)
            .with_metadata_field("a", "b");
        assert_eq!(config.target_dir(), Some(Path::new("out")));
        assert!(config.overwrite());
        assert_eq!(config.max_file_size(), 10);
        assert_eq!(config.metadata().len(), 1);
    }
}
