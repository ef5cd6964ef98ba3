//! Error types shared across the crate.
//!
//! Everything fatal funnels into [`Error`]; `main` renders it with its
//! `caused by:` chain and owns the exit code.

use std::io;
use thiserror::Error;

use crate::line_reader::MAX_LINE;
use crate::record::MAX_FIELDS;

/// Nicer alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while turning input bytes into records. A closed set: every
/// way a line can be rejected is one of these four.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line (excluding its terminator) exceeded [`MAX_LINE`] bytes.
    #[error("line is longer than {} bytes", MAX_LINE)]
    LineTooLong,

    /// The record had more than [`MAX_FIELDS`] fields.
    #[error("record has more than {} fields", MAX_FIELDS)]
    TooManyFields,

    /// A quoted field was still open at the end of the line.
    #[error("unterminated quoted field")]
    UnterminatedQuote,

    /// A closing quote was followed by something other than a comma or
    /// the end of the line.
    #[error("malformed quoted field")]
    MalformedQuotedField,
}

/// All the ways a run can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A record on the named 1-based input line could not be parsed.
    /// Line 1 is the header.
    #[error("cannot parse line {line}")]
    Parse {
        line: u64,
        #[source]
        source: ParseError,
    },

    /// A selector named a column that is not in the header.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// A numeric selector was outside the header's column range.
    #[error("column index {index} out of range 1..={columns}")]
    ColumnIndexOutOfRange { index: u64, columns: usize },

    /// A `--filter` expression did not parse.
    #[error("invalid filter expression `{0}`")]
    InvalidFilter(String),

    /// An `--agg` expression did not parse.
    #[error("invalid aggregation `{0}`")]
    InvalidAggregation(String),

    /// The requested flags cannot be combined.
    #[error("{0}")]
    IncompatibleOptions(String),

    /// An I/O failure on the output side, or anywhere we do not have a
    /// more specific story.
    #[error("I/O error")]
    Io(#[from] io::Error),
}

impl Error {
    /// Attach a 1-based input line number to a parse failure.
    pub fn on_line(line: u64, source: ParseError) -> Error {
        Error::Parse { line, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_render_with_line_numbers() {
        let err = Error::on_line(17, ParseError::UnterminatedQuote);
        assert_eq!(err.to_string(), "cannot parse line 17");
        let source = std::error::Error::source(&err).expect("has a cause");
        assert_eq!(source.to_string(), "unterminated quoted field");
    }

    #[test]
    fn column_errors_name_the_offender() {
        assert_eq!(
            Error::UnknownColumn("dept".into()).to_string(),
            "unknown column `dept`"
        );
        let err = Error::ColumnIndexOutOfRange {
            index: 9,
            columns: 3,
        };
        assert_eq!(err.to_string(), "column index 9 out of range 1..=3");
    }
}
