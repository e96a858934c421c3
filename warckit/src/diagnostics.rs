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

use std::fmt;


/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosisType {
    /// Malformed data.
    Invalid,
    /// Data is well-formed but does not have the expected value.
    InvalidExpected,
    /// Value is not encoded the way its field requires.
    InvalidEncoding,
    /// Expected data was not found.
    ErrorExpected,
    /// Data present where it is not allowed.
    UndesiredData,
    /// Field occurs more than once.
    Duplicate,
    /// Mandatory field is missing.
    Missing,
    /// Reserved name or value used.
    Reserved,
    /// Recommended field is missing.
    RecommendedMissing,
    /// Value could not be interpreted, e.g. an unknown digest algorithm.
    Unknown,
}

impl DiagnosisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosisType::Invalid => "invalid",
            DiagnosisType::InvalidExpected => "invalid, expected",
            DiagnosisType::InvalidEncoding => "invalid encoding",
            DiagnosisType::ErrorExpected => "expected",
            DiagnosisType::UndesiredData => "undesired data",
            DiagnosisType::Duplicate => "duplicate",
            DiagnosisType::Missing => "missing",
            DiagnosisType::Reserved => "reserved",
            DiagnosisType::RecommendedMissing => "recommended missing",
            DiagnosisType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DiagnosisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    kind: DiagnosisType,
    subject: String,
    info: Vec<String>,
}

impl Diagnosis {
    /// Create a new diagnosis.
    ///
    /// # Arguments
    ///
    /// * `kind` - Diagnosis category
    /// * `subject` - Entity the finding is about, usually a field name
    /// * `info` - Additional context, such as the offending and the expected value
    pub fn new<I, S>(kind: DiagnosisType, subject: impl Into<String>, info: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Diagnosis {
            kind,
            subject: subject.into(),
            info: info.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> DiagnosisType {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn info(&self) -> &[String] {
        &self.info
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.subject)?;
        if !self.info.is_empty() {
            write!(f, " ({})", self.info.join(", "))?;
        }
        Ok(())
    }
}


/// Accumulated errors and warnings of a record or reader.
///
/// Findings can only be added by the parsing and writing code of this crate.
/// Consumers get a read-only view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<Diagnosis>,
    warnings: Vec<Diagnosis>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> &[Diagnosis] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnosis] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether any error of the given kind about the given subject was recorded.
    pub fn has_error(&self, kind: DiagnosisType, subject: &str) -> bool {
        self.errors.iter().any(|d| d.kind == kind && d.subject == subject)
    }

    /// Whether any warning of the given kind about the given subject was recorded.
    pub fn has_warning(&self, kind: DiagnosisType, subject: &str) -> bool {
        self.warnings.iter().any(|d| d.kind == kind && d.subject == subject)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub(crate) fn add_error(&mut self, diagnosis: Diagnosis) {
        self.errors.push(diagnosis);
    }

    pub(crate) fn add_warning(&mut self, diagnosis: Diagnosis) {
        self.warnings.push(diagnosis);
    }

    pub(crate) fn error<I, S>(&mut self, kind: DiagnosisType, subject: impl Into<String>, info: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_error(Diagnosis::new(kind, subject, info));
    }

    pub(crate) fn warning<I, S>(&mut self, kind: DiagnosisType, subject: impl Into<String>, info: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_warning(Diagnosis::new(kind, subject, info));
    }

    /// Move all findings of `other` into this instance, preserving order.
    pub(crate) fn append(&mut self, other: &mut Diagnostics) {
        self.errors.append(&mut other.errors);
        self.warnings.append(&mut other.warnings);
    }
}
