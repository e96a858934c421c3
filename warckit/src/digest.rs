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

//! Content digests as they appear in `WARC-Block-Digest` and `WARC-Payload-Digest`.

use std::fmt;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use data_encoding::{BASE32, BASE32_NOPAD, HEXLOWER, HEXLOWER_PERMISSIVE};
use sha1::Digest;


/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve an algorithm label such as `sha1`, `SHA-1` or `sha256`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name.trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "md5" => Some(DigestAlgorithm::Md5),
            "sha1" => Some(DigestAlgorithm::Sha1),
            "sha256" => Some(DigestAlgorithm::Sha256),
            "sha512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Text encoding of the digest bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestEncoding {
    Base16,
    Base32,
    Base64,
}

impl DigestEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestEncoding::Base16 => "base16",
            DigestEncoding::Base32 => "base32",
            DigestEncoding::Base64 => "base64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "base16" | "hex" => Some(DigestEncoding::Base16),
            "base32" => Some(DigestEncoding::Base32),
            "base64" => Some(DigestEncoding::Base64),
            _ => None,
        }
    }

    /// Canonical rendering: lower-case hex, padded upper-case base32, padded base64.
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            DigestEncoding::Base16 => HEXLOWER.encode(bytes),
            DigestEncoding::Base32 => BASE32.encode(bytes),
            DigestEncoding::Base64 => STANDARD.encode(bytes),
        }
    }

    /// Decode leniently, accepting either letter case for base16/base32 and missing padding.
    pub fn decode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            DigestEncoding::Base16 => HEXLOWER_PERMISSIVE.decode(text.as_bytes()).ok(),
            DigestEncoding::Base32 => {
                let upper = text.to_ascii_uppercase();
                BASE32.decode(upper.as_bytes())
                    .or_else(|_| BASE32_NOPAD.decode(upper.as_bytes()))
                    .ok()
            }
            DigestEncoding::Base64 => STANDARD.decode(text)
                .or_else(|_| STANDARD_NO_PAD.decode(text))
                .ok(),
        }
    }
}

impl fmt::Display for DigestEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// A labelled content digest (`algorithm:encoded-value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestValue {
    algorithm: String,
    bytes: Vec<u8>,
    encoding: Option<DigestEncoding>,
    text: String,
}

impl DigestValue {
    /// Create a digest value from all of its parts without re-deriving anything.
    pub fn new(algorithm: impl Into<String>, bytes: Vec<u8>, encoding: Option<DigestEncoding>, text: impl Into<String>) -> Self {
        DigestValue {
            algorithm: algorithm.into(),
            bytes,
            encoding,
            text: text.into(),
        }
    }

    /// Create a digest value from raw digest bytes and derive its text rendering.
    pub fn from_bytes(algorithm: impl Into<String>, bytes: Vec<u8>, encoding: DigestEncoding) -> Self {
        let algorithm = algorithm.into();
        let text = format!("{}:{}", algorithm, encoding.encode(&bytes));
        DigestValue {
            algorithm,
            bytes,
            encoding: Some(encoding),
            text,
        }
    }

    /// Parse a header value such as `sha1:B2LTWWPUOYAH7UIPQ7ZUPQ4VMBSVC36A`.
    ///
    /// Returns `None` if the value is not of the form `algorithm:value`. If the algorithm
    /// is unknown or the value cannot be decoded to the algorithm's digest length, the
    /// digest is still returned, but with empty bytes and no encoding.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (algorithm, encoded) = value.split_once(':')?;
        let algorithm = algorithm.trim();
        let encoded = encoded.trim();
        if algorithm.is_empty() || encoded.is_empty() || encoded.contains(char::is_whitespace) {
            return None;
        }

        let decoded = DigestAlgorithm::from_name(algorithm).and_then(|alg| {
            [DigestEncoding::Base16, DigestEncoding::Base32, DigestEncoding::Base64]
                .into_iter()
                .find_map(|enc| enc.decode(encoded)
                    .filter(|b| b.len() == alg.output_len())
                    .map(|b| (b, enc)))
        });
        let (bytes, encoding) = match decoded {
            Some((b, e)) => (b, Some(e)),
            None => (Vec::new(), None),
        };
        Some(DigestValue {
            algorithm: algorithm.to_string(),
            bytes,
            encoding,
            text: value.to_string(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Resolved hash algorithm, if supported.
    pub fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        DigestAlgorithm::from_name(&self.algorithm)
    }

    /// Raw digest bytes (empty if the value could not be decoded).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> Option<DigestEncoding> {
        self.encoding
    }

    /// Full `algorithm:value` rendering.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Encoded value without the algorithm label.
    pub fn encoded(&self) -> &str {
        self.text.split_once(':').map(|(_, v)| v).unwrap_or(&self.text)
    }

    /// Whether the value decoded to digest bytes that can be compared.
    pub fn is_decoded(&self) -> bool {
        !self.bytes.is_empty()
    }
}

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}


/// Incremental hash state.
#[derive(Clone)]
pub struct Digester {
    algorithm: DigestAlgorithm,
    state: DigesterState,
}

#[derive(Clone)]
enum DigesterState {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let state = match algorithm {
            DigestAlgorithm::Md5 => DigesterState::Md5(md5::Md5::new()),
            DigestAlgorithm::Sha1 => DigesterState::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => DigesterState::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha512 => DigesterState::Sha512(sha2::Sha512::new()),
        };
        Digester { algorithm, state }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            DigesterState::Md5(h) => h.update(data),
            DigesterState::Sha1(h) => h.update(data),
            DigesterState::Sha256(h) => h.update(data),
            DigesterState::Sha512(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self.state {
            DigesterState::Md5(h) => h.finalize().to_vec(),
            DigesterState::Sha1(h) => h.finalize().to_vec(),
            DigesterState::Sha256(h) => h.finalize().to_vec(),
            DigesterState::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digester").field("algorithm", &self.algorithm).finish()
    }
}

/// Compute the digest of an in-memory buffer.
pub fn compute(algorithm: DigestAlgorithm, data: &[u8], encoding: DigestEncoding) -> DigestValue {
    let mut digester = Digester::new(algorithm);
    digester.update(data);
    DigestValue::from_bytes(algorithm.as_str(), digester.finalize(), encoding)
}
