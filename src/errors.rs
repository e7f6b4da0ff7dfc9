use core::fmt;
use std::{error, result};

/// Internally, we only use this Error type and a newtype wrapper around
/// `std::result::Result<T, E>` where `E` is fixed. Search failures that are
/// part of the normal descent protocol (a node with no outgoing work) are
/// signaled by boolean returns, not by this type.
#[derive(Debug)]
pub enum Error {
    EmptyQuery,
    QueryTooShort(usize),
    QualityLengthMismatch { seq: usize, qual: usize },
    ParseError(String),
    SearchSpaceExceeded,
}

impl fmt::Display for Error {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyQuery => write!(f, "The query read is empty"),
            Error::QueryTooShort(len) => write!(
                f,
                "The query read is {} bp long, but the descent engine needs at least 2 bp",
                len
            ),
            Error::QualityLengthMismatch { seq, qual } => write!(
                f,
                "Quality string length ({}) does not match read length ({})",
                qual, seq
            ),
            Error::ParseError(err) => write!(f, "Parse error: {}", err),
            Error::SearchSpaceExceeded => write!(
                f,
                "Search space limit exceeded; the current read has been aborted"
            ),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;
