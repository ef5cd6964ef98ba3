//! Delimited output with minimal quoting.

use std::io::Write;

use crate::errors::Result;
use crate::record::Cell;

/// Where processed rows go. One implementation per output shape:
/// [`DelimitedSink`] here, `TableSink` in the table module.
pub trait RowSink {
    /// Emit one row. The iterator is drained exactly once.
    fn write_row<'a>(&mut self, cells: &mut dyn Iterator<Item = Cell<'a>>) -> Result<()>;

    /// Emit anything still buffered. Called once, after the last row.
    fn finish(&mut self) -> Result<()>;
}

/// True if the field cannot be emitted bare.
fn needs_quotes(field: &[u8]) -> bool {
    field
        .iter()
        .any(|&b| b == b',' || b == b'"' || b == b'\n' || b == b'\r')
}

/// Write one field with enclosing quotes and doubled inner quotes.
fn write_quoted<W: Write>(out: &mut W, field: &[u8]) -> Result<()> {
    out.write_all(b"\"")?;
    let mut rest = field;
    while let Some(pos) = memchr::memchr(b'"', rest) {
        out.write_all(&rest[..pos])?;
        out.write_all(b"\"\"")?;
        rest = &rest[pos + 1..];
    }
    out.write_all(rest)?;
    out.write_all(b"\"")?;
    Ok(())
}

/// Emit a field under the minimal-quoting rule: enclosing quotes iff the
/// content contains a comma, quote, or line break.
pub fn write_field<W: Write>(out: &mut W, field: &[u8]) -> Result<()> {
    if needs_quotes(field) {
        write_quoted(out, field)
    } else {
        out.write_all(field)?;
        Ok(())
    }
}

/// Emit a field honoring its was-quoted bit: originally-quoted fields go
/// back through the minimal-quoting rule, originally-unquoted fields are
/// passed through raw. This keeps a pass-through faithful for fields
/// whose content is ambiguous in the input dialect (say, a bare `"` in
/// an unquoted field).
pub fn write_cell<W: Write>(out: &mut W, cell: Cell<'_>) -> Result<()> {
    if cell.quoted {
        write_field(out, cell.bytes)
    } else {
        out.write_all(cell.bytes)?;
        Ok(())
    }
}

/// Streams rows as delimited records, one write pass per row.
pub struct DelimitedSink<W> {
    out: W,
}

impl<W: Write> DelimitedSink<W> {
    pub fn new(out: W) -> DelimitedSink<W> {
        DelimitedSink { out }
    }
}

impl<W: Write> RowSink for DelimitedSink<W> {
    fn write_row<'a>(&mut self, cells: &mut dyn Iterator<Item = Cell<'a>>) -> Result<()> {
        let mut first = true;
        for cell in cells {
            if !first {
                self.out.write_all(b",")?;
            }
            first = false;
            write_cell(&mut self.out, cell)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
