//! Uniform reservoir sampling (Algorithm R).

use rand::rngs::ThreadRng;
use rand::Rng;

use crate::record::{OwnedRecord, Record};

/// A bounded uniform sample of the passing rows.
///
/// The first `capacity` rows fill the reservoir; row `i` (0-based) after
/// that replaces a random slot with probability `capacity / (i + 1)`,
/// by drawing `j` in `[0, i]` and replacing slot `j` when it lands in
/// range. Output order is reservoir order, not input order.
pub struct Reservoir<R: Rng = ThreadRng> {
    capacity: usize,
    /// Rows offered so far; the 0-based index of the next offer.
    seen: u64,
    rows: Vec<OwnedRecord>,
    rng: R,
}

impl Reservoir<ThreadRng> {
    /// A reservoir drawing from the thread-local CSPRNG.
    pub fn new(capacity: usize) -> Reservoir<ThreadRng> {
        Reservoir::with_rng(capacity, rand::thread_rng())
    }
}

impl<R: Rng> Reservoir<R> {
    pub fn with_rng(capacity: usize, rng: R) -> Reservoir<R> {
        Reservoir {
            capacity,
            seen: 0,
            rows: Vec::with_capacity(capacity.min(1024)),
            rng,
        }
    }

    /// Consider one passing row; deep-copies only when the row enters
    /// the reservoir.
    pub fn offer(&mut self, record: &Record<'_>) {
        if self.rows.len() < self.capacity {
            self.rows.push(record.to_owned());
        } else {
            let slot = self.rng.gen_range(0..=self.seen);
            if slot < self.capacity as u64 {
                self.rows[slot as usize] = record.to_owned();
            }
        }
        self.seen += 1;
    }

    pub fn into_rows(self) -> Vec<OwnedRecord> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuf;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn offer_all(reservoir: &mut Reservoir<StdRng>, count: usize) {
        let mut buf = RecordBuf::new();
        for i in 0..count {
            let line = format!("row{},{}", i, i);
            let record = buf.parse(line.as_bytes()).unwrap();
            reservoir.offer(&record);
        }
    }

    fn seeded(capacity: usize, seed: u64) -> Reservoir<StdRng> {
        Reservoir::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn short_inputs_are_kept_whole_in_order() {
        let mut reservoir = seeded(5, 7);
        offer_all(&mut reservoir, 3);
        let rows = reservoir.into_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].field(0), Some(&b"row0"[..]));
        assert_eq!(rows[2].field(0), Some(&b"row2"[..]));
    }

    #[test]
    fn long_inputs_are_bounded_to_capacity() {
        let mut reservoir = seeded(10, 42);
        offer_all(&mut reservoir, 1000);
        let rows = reservoir.into_rows();
        assert_eq!(rows.len(), 10);
    }

    #[test]
    fn sampled_rows_come_from_the_input_without_repeats() {
        let mut reservoir = seeded(10, 42);
        offer_all(&mut reservoir, 1000);
        let mut names: Vec<Vec<u8>> = reservoir
            .into_rows()
            .into_iter()
            .map(|row| row.field(0).unwrap().to_vec())
            .collect();
        for name in &names {
            assert!(name.starts_with(b"row"));
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 10, "a physical row may be sampled once only");
    }

    #[test]
    fn later_rows_do_get_sampled() {
        // Over enough input, at least one replacement beyond the fill
        // phase must have happened for any seed.
        let mut reservoir = seeded(4, 99);
        offer_all(&mut reservoir, 500);
        let fill_phase: [&[u8]; 4] = [b"row0", b"row1", b"row2", b"row3"];
        let beyond_fill = reservoir
            .into_rows()
            .iter()
            .filter(|row| !fill_phase.contains(&row.field(0).unwrap()))
            .count();
        assert!(beyond_fill > 0);
    }

    #[test]
    fn capacity_zero_never_retains_anything() {
        let mut reservoir = seeded(0, 1);
        offer_all(&mut reservoir, 50);
        assert!(reservoir.into_rows().is_empty());
    }
}
