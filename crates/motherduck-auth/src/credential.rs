//! Structural credential validation
//!
//! A MotherDuck token is a compact signed token: three dot-separated,
//! non-empty segments. Only that shape is checked here. Signatures and
//! claims are the database's business.

use std::fmt;

use serde::Serialize;

/// A token string that has passed [`validate`].
///
/// The only way to obtain one is through [`validate`], so holding a
/// `Credential` means the three-segment shape has been checked.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

/// Why a candidate token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The token was missing or the empty string
    Empty,
    /// The token did not split into exactly three segments
    SegmentCount(usize),
    /// The segment at this zero-based index was empty
    EmptySegment(usize),
}

impl InvalidReason {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            InvalidReason::Empty => "empty",
            InvalidReason::SegmentCount(_) => "segment_count",
            InvalidReason::EmptySegment(_) => "empty_segment",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Empty => write!(f, "token is empty"),
            InvalidReason::SegmentCount(n) => {
                write!(f, "expected 3 dot-separated segments, found {n}")
            }
            InvalidReason::EmptySegment(i) => write!(f, "segment {i} is empty"),
        }
    }
}

/// Outcome of a structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(Credential),
    Invalid(InvalidReason),
}

impl Validation {
    pub fn into_result(self) -> Result<Credential, InvalidReason> {
        match self {
            Validation::Valid(credential) => Ok(credential),
            Validation::Invalid(reason) => Err(reason),
        }
    }
}

/// Check that `raw` has the shape of a compact signed token.
pub fn validate(raw: &str) -> Validation {
    if raw.is_empty() {
        return Validation::Invalid(InvalidReason::Empty);
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return Validation::Invalid(InvalidReason::SegmentCount(segments.len()));
    }
    if let Some(index) = segments.iter().position(|s| s.is_empty()) {
        return Validation::Invalid(InvalidReason::EmptySegment(index));
    }

    Validation::Valid(Credential(raw.to_owned()))
}
