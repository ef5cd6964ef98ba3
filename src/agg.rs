//! Streaming aggregation.

use crate::columns;
use crate::errors::{Error, Result};
use crate::record::{OwnedRecord, Record};
use crate::util::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    Count,
    Mean,
}

impl AggFunc {
    fn parse(name: &str) -> Option<AggFunc> {
        match name {
            "sum" => Some(AggFunc::Sum),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "count" => Some(AggFunc::Count),
            "mean" => Some(AggFunc::Mean),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Mean => "mean",
        }
    }
}

/// Render a result the way `f64` displays: integral totals print bare.
fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// One `func:field` aggregator and its running state.
///
/// `count` counts non-empty fields. The numeric functions require every
/// observed value to parse; a single non-numeric value taints the
/// aggregator, which then emits an empty value and a warning instead of
/// a number. Tainted aggregators keep out of the way of the others.
#[derive(Debug)]
pub struct Aggregator {
    func: AggFunc,
    column: usize,
    label: String,
    total: f64,
    extreme: Option<f64>,
    count: u64,
    tainted: bool,
}

impl Aggregator {
    /// Compile a `func:field` expression and bind the field. The split
    /// is at the first colon, so field names may contain further colons.
    pub fn compile(expression: &str, header: &OwnedRecord) -> Result<Aggregator> {
        let mut parts = expression.splitn(2, ':');
        let func_name = parts.next().unwrap_or("");
        let field = match parts.next() {
            Some(field) => field,
            None => return Err(Error::InvalidAggregation(expression.to_owned())),
        };
        let func = AggFunc::parse(func_name)
            .ok_or_else(|| Error::InvalidAggregation(expression.to_owned()))?;
        let column = columns::resolve(header, field)?;
        Ok(Aggregator {
            func,
            column,
            label: format!("{}({})", func.name(), field),
            total: 0.0,
            extreme: None,
            count: 0,
            tainted: false,
        })
    }

    /// Column header for the output row: `func(field)`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Fold one passing row into the running state.
    pub fn update(&mut self, record: &Record<'_>) {
        let field = record.field(self.column).unwrap_or(b"");
        if self.func == AggFunc::Count {
            if !field.is_empty() {
                self.count += 1;
            }
            return;
        }
        match parse_number(field) {
            Some(value) => {
                self.count += 1;
                self.total += value;
                self.extreme = Some(match self.extreme {
                    None => value,
                    Some(current) => match self.func {
                        AggFunc::Min => current.min(value),
                        AggFunc::Max => current.max(value),
                        _ => current,
                    },
                });
            }
            None => self.tainted = true,
        }
    }

    /// The rendered value, or `None` when taint suppressed it.
    pub fn value(&self) -> Option<String> {
        if self.tainted {
            return None;
        }
        Some(match self.func {
            AggFunc::Count => self.count.to_string(),
            AggFunc::Sum => format_number(self.total),
            AggFunc::Mean => {
                if self.count == 0 {
                    "0".to_owned()
                } else {
                    format_number(self.total / self.count as f64)
                }
            }
            AggFunc::Min | AggFunc::Max => match self.extreme {
                Some(extreme) => format_number(extreme),
                None => String::new(),
            },
        })
    }
}
