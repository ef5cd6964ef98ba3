//! Bounded top-N selection over a key column.

use std::cmp::Ordering;

use crate::record::{OwnedRecord, Record};
use crate::util::parse_number;

/// Hard cap on the candidate buffer, enforced at argument time.
pub const MAX_LIMIT: u64 = 10_000;

/// Pairwise key order: numeric when both sides parse as numbers, byte
/// order otherwise. Applied at replacement time, per pair.
fn key_cmp(a_key: &[u8], a_num: Option<f64>, b_key: &[u8], b_num: Option<f64>) -> Ordering {
    match (a_num, b_num) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => a_key.cmp(b_key),
    }
}

struct Candidate {
    record: OwnedRecord,
    key: Vec<u8>,
    number: Option<f64>,
}

/// Keeps the `limit` highest-keyed rows seen so far.
///
/// Replacement is a linear scan for the smallest key; with the limit
/// capped at 10,000 that beats a heap on cache locality, and the
/// observable behavior would be the same either way.
pub struct TopN {
    limit: usize,
    key_column: usize,
    rows: Vec<Candidate>,
}

impl TopN {
    pub fn new(key_column: usize, limit: usize) -> TopN {
        TopN {
            limit,
            key_column,
            rows: Vec::with_capacity(limit.min(1024)),
        }
    }

    /// Consider one passing row. Deep-copies only when the row actually
    /// enters the buffer.
    pub fn offer(&mut self, record: &Record<'_>) {
        if self.limit == 0 {
            return;
        }
        let key = record.field(self.key_column).unwrap_or(b"");
        let number = parse_number(key);

        if self.rows.len() < self.limit {
            self.rows.push(Candidate {
                record: record.to_owned(),
                key: key.to_vec(),
                number,
            });
            return;
        }

        let mut smallest = 0;
        for i in 1..self.rows.len() {
            let challenger = &self.rows[i];
            let holder = &self.rows[smallest];
            if key_cmp(&challenger.key, challenger.number, &holder.key, holder.number)
                == Ordering::Less
            {
                smallest = i;
            }
        }

        // Replace only on a strictly greater key, so earlier rows win
        // ties at the cutoff.
        let holder = &self.rows[smallest];
        if key_cmp(key, number, &holder.key, holder.number) == Ordering::Greater {
            self.rows[smallest] = Candidate {
                record: record.to_owned(),
                key: key.to_vec(),
                number,
            };
        }
    }

    /// Finish the scan: candidates in descending key order, insertion
    /// order breaking ties.
    pub fn into_sorted(self) -> Vec<OwnedRecord> {
        let mut rows = self.rows;
        rows.sort_by(|a, b| key_cmp(&b.key, b.number, &a.key, a.number));
        rows.into_iter().map(|candidate| candidate.record).collect()
    }
}
