//! Filter expression compilation and evaluation.

use std::cmp::Ordering;

use crate::columns;
use crate::errors::{Error, Result};
use crate::glob::glob_match;
use crate::record::{OwnedRecord, Record};
use crate::util::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Relation(Relation),
    Glob,
}

/// Candidate operators, two-character tokens first so they win over
/// their one-character prefixes at the same position.
const OPERATORS: [(&str, Op); 7] = [
    ("!=", Op::Relation(Relation::Ne)),
    ("<=", Op::Relation(Relation::Le)),
    (">=", Op::Relation(Relation::Ge)),
    ("=", Op::Relation(Relation::Eq)),
    ("~", Op::Glob),
    ("<", Op::Relation(Relation::Lt)),
    (">", Op::Relation(Relation::Gt)),
];

fn relation_holds(relation: Relation, ord: Ordering) -> bool {
    match relation {
        Relation::Eq => ord == Ordering::Equal,
        Relation::Ne => ord != Ordering::Equal,
        Relation::Lt => ord == Ordering::Less,
        Relation::Gt => ord == Ordering::Greater,
        Relation::Le => ord != Ordering::Greater,
        Relation::Ge => ord != Ordering::Less,
    }
}

/// Split `field op value` at the first operator occurrence. The
/// operator may not sit at position 0, and the field name may not trim
/// to nothing.
fn split_expression(expression: &str) -> Option<(&str, Op, &str)> {
    let bytes = expression.as_bytes();
    for i in 0..bytes.len() {
        for &(token, op) in OPERATORS.iter() {
            if bytes[i..].starts_with(token.as_bytes()) {
                if i == 0 {
                    return None;
                }
                let name = expression[..i].trim();
                if name.is_empty() {
                    return None;
                }
                let value = expression[i + token.len()..].trim();
                return Some((name, op, value));
            }
        }
    }
    None
}

/// A compiled, header-bound filter. Rows pass a set of predicates iff
/// every one of them evaluates true.
#[derive(Debug)]
pub struct Predicate {
    column: usize,
    op: Op,
    value: Vec<u8>,
    /// Precomputed numeric form of the right-hand side. Its presence
    /// switches the relational operators into numeric mode.
    number: Option<f64>,
}

impl Predicate {
    /// Compile an expression and bind its field against the header.
    pub fn compile(expression: &str, header: &OwnedRecord) -> Result<Predicate> {
        let (name, op, value) = split_expression(expression)
            .ok_or_else(|| Error::InvalidFilter(expression.to_owned()))?;
        let column = columns::resolve(header, name)?;
        Ok(Predicate {
            column,
            op,
            value: value.as_bytes().to_vec(),
            number: parse_number(value.as_bytes()),
        })
    }

    pub fn eval(&self, record: &Record<'_>) -> bool {
        let field = match record.field(self.column) {
            Some(field) => field,
            None => return false,
        };
        match self.op {
            Op::Glob => glob_match(&self.value, field),
            Op::Relation(relation) => {
                if let Some(rhs) = self.number {
                    // Numeric right-hand side: a field that does not
                    // parse as a number rejects the row rather than
                    // falling back to byte order.
                    match parse_number(field) {
                        Some(lhs) => lhs
                            .partial_cmp(&rhs)
                            .map(|ord| relation_holds(relation, ord))
                            .unwrap_or(false),
                        None => false,
                    }
                } else {
                    relation_holds(relation, field.cmp(&self.value[..]))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuf;

    fn header() -> OwnedRecord {
        RecordBuf::new()
            .parse(b"name,score,dept,Total Amount")
            .unwrap()
            .to_owned()
    }

    fn eval(expression: &str, line: &[u8]) -> bool {
        let predicate = Predicate::compile(expression, &header()).unwrap();
        let mut buf = RecordBuf::new();
        let record = buf.parse(line).unwrap();
        predicate.eval(&record)
    }

    #[test]
    fn split_prefers_two_character_operators() {
        let (name, op, value) = split_expression("score!=3").unwrap();
        assert_eq!((name, value), ("score", "3"));
        assert_eq!(op, Op::Relation(Relation::Ne));

        let (_, op, value) = split_expression("score<=3").unwrap();
        assert_eq!(op, Op::Relation(Relation::Le));
        assert_eq!(value, "3");

        let (_, op, _) = split_expression("score<3").unwrap();
        assert_eq!(op, Op::Relation(Relation::Lt));
    }

    #[test]
    fn split_is_first_occurrence() {
        let (name, op, value) = split_expression("x=y=z").unwrap();
        assert_eq!((name, value), ("x", "y=z"));
        assert_eq!(op, Op::Relation(Relation::Eq));

        // `!` alone is not an operator; the `<` wins first.
        let (name, _, value) = split_expression("a<b!c").unwrap();
        assert_eq!((name, value), ("a", "b!c"));
    }

    #[test]
    fn split_trims_whitespace() {
        let (name, op, value) = split_expression("Total Amount > 100").unwrap();
        assert_eq!(name, "Total Amount");
        assert_eq!(op, Op::Relation(Relation::Gt));
        assert_eq!(value, "100");
    }

    #[test]
    fn operator_at_position_zero_is_invalid() {
        assert!(split_expression("=5").is_none());
        assert!(split_expression("~x").is_none());
        assert!(split_expression(" = 5").is_none());
    }

    #[test]
    fn expression_without_operator_is_invalid() {
        assert!(split_expression("score").is_none());
        assert!(split_expression("").is_none());
    }

    #[test]
    fn compile_reports_bad_expressions() {
        match Predicate::compile("nonsense", &header()).unwrap_err() {
            Error::InvalidFilter(expr) => assert_eq!(expr, "nonsense"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn compile_reports_unknown_fields() {
        match Predicate::compile("salary>10", &header()).unwrap_err() {
            Error::UnknownColumn(name) => assert_eq!(name, "salary"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn numeric_comparison_when_both_sides_parse() {
        assert!(eval("score>8", b"Ann,9,Eng,0"));
        assert!(!eval("score>8", b"Ann,8,Eng,0"));
        assert!(eval("score>=8", b"Ann,8,Eng,0"));
        assert!(eval("score<8", b"Ann,7.5,Eng,0"));
        assert!(eval("score=9", b"Ann,9.0,Eng,0"));
        assert!(eval("score!=9", b"Ann,10,Eng,0"));
    }

    #[test]
    fn numeric_right_hand_side_rejects_non_numeric_fields() {
        // `score>100` must not match the string `abc`.
        assert!(!eval("score>100", b"Ann,abc,Eng,0"));
        assert!(!eval("score<100", b"Ann,abc,Eng,0"));
        assert!(!eval("score!=100", b"Ann,abc,Eng,0"));
    }

    #[test]
    fn byte_comparison_when_right_hand_side_is_not_numeric() {
        assert!(eval("dept=Eng", b"Ann,9,Eng,0"));
        assert!(!eval("dept=Eng", b"Ann,9,Sales,0"));
        assert!(eval("dept<Sales", b"Ann,9,Eng,0"));
        assert!(eval("name>=Ann", b"Bob,9,Eng,0"));
    }

    #[test]
    fn glob_operator_is_always_a_string_match() {
        assert!(eval("dept~E*", b"Ann,9,Eng,0"));
        assert!(eval("name~*nn", b"Ann,9,Eng,0"));
        assert!(!eval("dept~E*", b"Ann,9,Sales,0"));
        // Even a numeric-looking pattern stays a glob.
        assert!(eval("score~9*", b"Ann,99,Eng,0"));
    }

    #[test]
    fn missing_columns_reject_the_row() {
        assert!(!eval("Total Amount=0", b"Ann,9"));
    }

    #[test]
    fn byte_mode_covers_every_relation() {
        assert!(eval("dept!=Eng", b"Ann,9,Ops,0"));
        assert!(!eval("dept!=Eng", b"Ann,9,Eng,0"));
        assert!(eval("dept<=Eng", b"Ann,9,Eng,0"));
        assert!(eval("dept<=Ops", b"Ann,9,Eng,0"));
        assert!(!eval("dept<=Ape", b"Ann,9,Eng,0"));
        assert!(eval("dept>=Eng", b"Ann,9,Eng,0"));
        assert!(eval("dept>Ape", b"Ann,9,Eng,0"));
    }

    #[test]
    fn numeric_mode_covers_every_relation() {
        assert!(eval("score<=9", b"Ann,9,Eng,0"));
        assert!(eval("score>=9", b"Ann,9,Eng,0"));
        assert!(!eval("score<9", b"Ann,9,Eng,0"));
        // Left-padded numbers still compare numerically.
        assert!(eval("score=9", b"Ann, 9,Eng,0"));
    }

    #[test]
    fn empty_values_compare_against_empty_fields() {
        assert!(eval("dept=", b"Ann,9,,0"));
        assert!(!eval("dept=", b"Ann,9,Eng,0"));
        assert!(eval("dept!=", b"Ann,9,Eng,0"));
    }

    #[test]
    fn empty_glob_matches_only_empty_fields() {
        assert!(eval("dept~", b"Ann,9,,0"));
        assert!(!eval("dept~", b"Ann,9,Eng,0"));
    }

    #[test]
    fn quoted_fields_compare_by_content() {
        assert!(eval("dept=En,g", b"Ann,9,\"En,g\",0"));
    }
}
