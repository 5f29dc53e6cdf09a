//! Evaluates filter specifications against in-memory rows with the same
//! outcome the compiled SQL has in PostgreSQL.
//!
//! NULL never satisfies a comparison, `contains` is case-insensitive, and
//! vacuous entries behave as they do in the compiler: ignored under AND,
//! matching nothing under OR.

use std::cmp::Ordering;

use super::{Condition, FilterEntry, FilterScalar, FilterSpec, FilterValue, Operator};

/// Anything whose columns can be read by name. `None` is SQL NULL.
pub trait FilterRow {
    fn attribute(&self, column: &str) -> Option<FilterScalar>;
}

pub fn matches_condition<R: FilterRow + ?Sized>(condition: &Condition, row: &R) -> bool {
    let actual = row.attribute(condition.column.as_str());

    match (&condition.operator, &condition.value) {
        (Operator::Eq, FilterValue::Null) | (Operator::IsNull, _) => actual.is_none(),
        (Operator::Neq, FilterValue::Null) | (Operator::NotNull, _) => actual.is_some(),
        (Operator::In, FilterValue::List(items)) => {
            // Omitted clause
            if items.is_empty() {
                return true;
            }
            actual.is_some_and(|a| items.iter().any(|item| a.sql_eq(item)))
        }
        (Operator::Contains, FilterValue::Scalar(needle)) => actual.is_some_and(|a| {
            a.as_text()
                .to_lowercase()
                .contains(&needle.as_text().to_lowercase())
        }),
        (op, FilterValue::Scalar(expected)) => {
            let Some(ordering) = actual.and_then(|a| a.compare(expected)) else {
                return false;
            };
            match op {
                Operator::Eq => ordering == Ordering::Equal,
                Operator::Neq => ordering != Ordering::Equal,
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gte => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                Operator::Lte => ordering != Ordering::Greater,
                _ => false,
            }
        }
        _ => false,
    }
}

pub fn matches_entry<R: FilterRow + ?Sized>(entry: &FilterEntry, row: &R) -> bool {
    match entry {
        FilterEntry::Group(group) => group.conditions.iter().all(|c| matches_condition(c, row)),
        FilterEntry::Equality(map) => map.iter().all(|(column, expected)| {
            match (row.attribute(column.as_str()), expected) {
                (None, None) => true,
                (Some(actual), Some(expected)) => actual.sql_eq(expected),
                _ => false,
            }
        }),
    }
}

pub fn matches_spec<R: FilterRow + ?Sized>(spec: &FilterSpec, row: &R) -> bool {
    spec.entries().iter().all(|entry| matches_entry(entry, row))
}

pub fn matches_any<R: FilterRow + ?Sized>(entries: &[FilterEntry], row: &R) -> bool {
    entries
        .iter()
        .filter(|entry| !entry.is_vacuous())
        .any(|entry| matches_entry(entry, row))
}
