//! Error taxonomy for the codec.
//!
//! Fatal errors ([`WireError`]) abort the in-flight operation immediately.
//! Non-fatal errors ([`NonFatal`]) are accumulated: the first one reported
//! wins, but the rest of the message is still populated, matching
//! `RequiredNotSet`/`InvalidUTF8` semantics from the wire format.

use std::fmt::{self, Debug, Display, Formatter, Write as _};

/// Fatal error classes that abort marshal/unmarshal/merge/equal immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Input ended in the middle of a record.
    Truncated,
    /// A varint ran past 10 bytes without terminating.
    MalformedVarint,
    /// Wire type 6 or 7 was encountered.
    ReservedWireType,
    /// An `EGROUP` was missing, or its field number did not match the `SGROUP`.
    GroupMismatch,
    /// Recursion (submessage/group nesting) exceeded the configured limit.
    RecursionLimit,
    /// An extension's declared type does not match the extendee's expectation.
    BadExtensionType,
    /// An extension field number fell outside every declared extension range.
    BadExtensionRange,
    /// `Equal`/`Merge` were called across incompatible descriptors.
    DescriptorMismatch,
    /// An operation that requires a populated message was called on a null one.
    NilMessage,
}

impl Display for WireError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let msg = match self {
            WireError::Truncated => "input ended mid-record",
            WireError::MalformedVarint => "malformed varint",
            WireError::ReservedWireType => "reserved wire type",
            WireError::GroupMismatch => "group start/end field number mismatch",
            WireError::RecursionLimit => "recursion limit exceeded",
            WireError::BadExtensionType => "extension type does not match extendee",
            WireError::BadExtensionRange => "extension number outside declared range",
            WireError::DescriptorMismatch => "operation requires identical descriptors",
            WireError::NilMessage => "operation called on a null-valued message",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for WireError {}

/// One level of nesting in a field-path traceback, recorded innermost-first
/// and reversed on display.
#[derive(Clone, Debug)]
pub enum PathElement {
    /// A message field, addressed by number.
    Field(u32),
    /// An index into a repeated field.
    Index(usize),
    /// A map key, rendered via its `Debug` text.
    Key(String),
}

/// A fatal error annotated with the field path that was being processed when
/// it occurred, accumulated innermost-call-first as the recursion unwinds.
#[derive(Clone, Debug)]
pub struct PathError {
    pub error: WireError,
    path: Vec<PathElement>,
}

impl PathError {
    pub fn new(error: WireError) -> Self {
        Self {
            error,
            path: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, number: u32) -> Self {
        self.path.push(PathElement::Field(number));
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.path.push(PathElement::Index(index));
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: String) -> Self {
        self.path.push(PathElement::Key(key));
        self
    }
}

impl From<WireError> for PathError {
    fn from(error: WireError) -> Self {
        PathError::new(error)
    }
}

impl Display for PathError {
    // Renders like `CodecError(.2[4].a): malformed varint`, matching the
    // traceback formatting used throughout the corpus for nested decode errors.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("CodecError(")?;
        for element in self.path.iter().rev() {
            match element {
                PathElement::Field(number) => {
                    f.write_char('.')?;
                    Display::fmt(number, f)?;
                }
                PathElement::Index(index) => {
                    f.write_char('[')?;
                    Display::fmt(index, f)?;
                    f.write_char(']')?;
                }
                PathElement::Key(key) => {
                    f.write_char('{')?;
                    f.write_str(key)?;
                    f.write_char('}')?;
                }
            }
        }
        f.write_str("): ")?;
        Display::fmt(&self.error, f)
    }
}

impl std::error::Error for PathError {}

/// A non-fatal condition: the operation still completes and the message is
/// fully populated, but the caller should know this happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NonFatal {
    /// One or more required (proto2) fields were never set.
    RequiredNotSet(String),
    /// A `string` field contained bytes that were not valid UTF-8.
    InvalidUtf8(String),
}

impl Display for NonFatal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NonFatal::RequiredNotSet(path) => write!(f, "required field not set: {path}"),
            NonFatal::InvalidUtf8(path) => write!(f, "invalid UTF-8 in string field: {path}"),
        }
    }
}

impl std::error::Error for NonFatal {}

/// Accumulates non-fatal conditions: the first one reported is preserved,
/// later ones are dropped on the floor (per spec, only one representative
/// path is surfaced to the caller).
#[derive(Default, Debug, Clone)]
pub struct NonFatalSink {
    first: Option<NonFatal>,
}

impl NonFatalSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, condition: NonFatal) {
        if self.first.is_none() {
            self.first = Some(condition);
        }
    }

    pub fn into_result(self) -> Result<(), NonFatal> {
        match self.first {
            Some(condition) => Err(condition),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

/// The top-level error returned by marshal/unmarshal: a fatal wire error, or
/// success with an optional accumulated non-fatal condition.
#[derive(Debug, Clone)]
pub enum CodecError {
    Fatal(PathError),
    NonFatal(NonFatal),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Fatal(e) => Display::fmt(e, f),
            CodecError::NonFatal(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<PathError> for CodecError {
    fn from(e: PathError) -> Self {
        CodecError::Fatal(e)
    }
}

impl From<WireError> for CodecError {
    fn from(e: WireError) -> Self {
        CodecError::Fatal(PathError::new(e))
    }
}

impl From<NonFatal> for CodecError {
    fn from(e: NonFatal) -> Self {
        CodecError::NonFatal(e)
    }
}
