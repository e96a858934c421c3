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

//! Raised failures.
//!
//! Format and policy violations found while parsing are never returned as errors. They are
//! collected as [`Diagnosis`](crate::Diagnosis) entries on the record or reader instead.
//! Only conditions that make the current operation impossible end up here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A compression frame could not be opened or decoded.
    #[error("Compression error: {0}")]
    Compression(String),

    /// A constructor or setter rejected its argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operations were called out of order.
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    /// Payload access on a record that has already been closed.
    #[error("Record has already been closed")]
    RecordClosed,

    /// Number of payload bytes written does not match the declared Content-Length.
    #[error("Payload length mismatch: expected {expected} bytes, got {written}")]
    PayloadLength { expected: u64, written: u64 },

    /// Header has no parseable Content-Length, so the record cannot be framed.
    #[error("Header has no valid Content-Length")]
    MissingContentLength,

    /// No further records are available.
    #[error("No more records")]
    NoSuchElement,

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Whether the error originates from a corrupt or truncated compression frame.
    pub fn is_compression(&self) -> bool {
        match self {
            Error::Compression(_) => true,
            Error::Io(e) => matches!(e.kind(), std::io::ErrorKind::InvalidData | std::io::ErrorKind::InvalidInput),
            _ => false,
        }
    }
}
