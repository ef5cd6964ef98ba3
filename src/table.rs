//! Aligned table output.
//!
//! Column widths are estimated from the header plus a bounded prefix of
//! the data, then frozen. Rows arriving after the sample is flushed are
//! padded to the frozen widths and may visually misalign if wider; they
//! are never truncated.

use std::io::Write;

use crate::errors::Result;
use crate::record::Cell;
use crate::util::display_width;
use crate::writer::RowSink;

/// The width sample stops growing once it holds this many field bytes.
pub const SAMPLE_BYTE_CAP: usize = 1024 * 1024;

const SPACES: [u8; 32] = [b' '; 32];
const DASHES: [u8; 32] = [b'-'; 32];

fn write_run<W: Write>(out: &mut W, run: &[u8; 32], mut n: usize) -> Result<()> {
    while n > 0 {
        let chunk = n.min(run.len());
        out.write_all(&run[..chunk])?;
        n -= chunk;
    }
    Ok(())
}

/// Buffers a width sample, then streams.
pub struct TableSink<W> {
    out: W,
    header: Vec<Vec<u8>>,
    widths: Vec<usize>,
    show_header: bool,
    /// Output row cap, when one is in effect; sampling never outlives it.
    row_cap: Option<u64>,
    sample: Vec<Vec<Vec<u8>>>,
    sampled_bytes: usize,
    flushed: bool,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W, header: Vec<Vec<u8>>, show_header: bool, row_cap: Option<u64>) -> TableSink<W> {
        let widths = header.iter().map(|name| display_width(name)).collect();
        TableSink {
            out,
            header,
            widths,
            show_header,
            row_cap,
            sample: Vec::new(),
            sampled_bytes: 0,
            flushed: false,
        }
    }

    fn emit_cells<'a, I>(&mut self, cells: I) -> Result<()>
    where
        I: Iterator<Item = &'a [u8]>,
    {
        for (i, cell) in cells.enumerate() {
            if i > 0 {
                self.out.write_all(b" | ")?;
            }
            self.out.write_all(cell)?;
            let width = self.widths.get(i).copied().unwrap_or(0);
            let pad = width.saturating_sub(display_width(cell));
            write_run(&mut self.out, &SPACES, pad)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn emit_separator(&mut self) -> Result<()> {
        for i in 0..self.widths.len() {
            if i > 0 {
                self.out.write_all(b"-+-")?;
            }
            let width = self.widths[i];
            write_run(&mut self.out, &DASHES, width)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Emit the header, the separator, and everything sampled so far;
    /// widths are frozen from here on.
    fn flush_sample(&mut self) -> Result<()> {
        if self.show_header {
            let header = std::mem::take(&mut self.header);
            self.emit_cells(header.iter().map(|name| &name[..]))?;
            self.emit_separator()?;
            self.header = header;
        }
        let sample = std::mem::take(&mut self.sample);
        for row in &sample {
            self.emit_cells(row.iter().map(|cell| &cell[..]))?;
        }
        self.flushed = true;
        Ok(())
    }
}

impl<W: Write> RowSink for TableSink<W> {
    fn write_row<'a>(&mut self, cells: &mut dyn Iterator<Item = Cell<'a>>) -> Result<()> {
        if self.flushed {
            // Streaming phase: pad to the frozen widths and move on.
            let mut i = 0;
            for cell in cells {
                if i > 0 {
                    self.out.write_all(b" | ")?;
                }
                self.out.write_all(cell.bytes)?;
                let width = self.widths.get(i).copied().unwrap_or(0);
                let pad = width.saturating_sub(display_width(cell.bytes));
                write_run(&mut self.out, &SPACES, pad)?;
                i += 1;
            }
            self.out.write_all(b"\n")?;
            return Ok(());
        }

        // Sampling phase: deep-copy the row and refine the widths.
        let row: Vec<Vec<u8>> = cells.map(|cell| cell.bytes.to_vec()).collect();
        for (i, cell) in row.iter().enumerate() {
            // Columns the header does not have keep width zero.
            if i < self.widths.len() {
                self.widths[i] = self.widths[i].max(display_width(cell));
            }
            self.sampled_bytes += cell.len();
        }
        self.sample.push(row);

        let cap_reached = self
            .row_cap
            .map(|cap| self.sample.len() as u64 >= cap)
            .unwrap_or(false);
        if self.sampled_bytes >= SAMPLE_BYTE_CAP || cap_reached {
            self.flush_sample()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if !self.flushed {
            self.flush_sample()?;
        }
        Ok(())
    }
}
