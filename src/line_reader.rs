//! Logical-line reading from a buffered byte stream.

use std::io::{BufRead, Read};

use crate::errors::{Error, ParseError, Result};

/// Longest logical line we accept, terminator excluded.
pub const MAX_LINE: usize = 1024 * 1024;

/// Yields one logical line at a time from a `BufRead`.
///
/// A line runs up to and excluding the next `\n`; a trailing `\r` is
/// stripped. Empty lines are skipped transparently. The returned slice
/// points into an internal buffer and is only valid until the next call.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Physical 1-based number of the most recently read line, blank
    /// lines included.
    line: u64,
    /// Total bytes consumed from the stream, terminators included.
    bytes: u64,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> LineReader<R> {
        LineReader {
            inner,
            buf: Vec::with_capacity(8 * 1024),
            line: 0,
            bytes: 0,
        }
    }

    /// 1-based physical line number of the last line returned.
    pub fn line_number(&self) -> u64 {
        self.line
    }

    /// Cumulative bytes read from the underlying stream.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Read the next non-empty logical line, returning its physical line
    /// number and its bytes, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<(u64, &[u8])>> {
        loop {
            self.buf.clear();
            // `take` keeps a hostile unterminated line from growing the
            // buffer past the cap: MAX_LINE content plus CRLF is the
            // longest read that can still be a legal line.
            let n = (&mut self.inner)
                .take((MAX_LINE + 2) as u64)
                .read_until(b'\n', &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line += 1;
            self.bytes += n as u64;

            if self.buf.last() == Some(&b'\n') {
                self.buf.pop();
            }
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.len() > MAX_LINE {
                return Err(Error::on_line(self.line, ParseError::LineTooLong));
            }
            if self.buf.is_empty() {
                continue;
            }
            return Ok(Some((self.line, &self.buf[..])));
        }
    }
}
