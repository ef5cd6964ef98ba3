//! Selector resolution against the header.

use crate::errors::{Error, Result};
use crate::record::OwnedRecord;

/// Resolve a selector to a zero-based column index.
///
/// A selector that parses as a positive integer is a 1-based column
/// index and must be in range; anything else is matched byte-for-byte
/// against the header names, first match winning. Resolution happens
/// once at startup, so failures are fatal and name the offender.
pub fn resolve(header: &OwnedRecord, selector: &str) -> Result<usize> {
    if let Ok(index) = selector.parse::<u64>() {
        if index >= 1 {
            if index as usize <= header.len() {
                return Ok(index as usize - 1);
            }
            return Err(Error::ColumnIndexOutOfRange {
                index,
                columns: header.len(),
            });
        }
    }
    for i in 0..header.len() {
        if header.field(i) == Some(selector.as_bytes()) {
            return Ok(i);
        }
    }
    Err(Error::UnknownColumn(selector.to_owned()))
}
