//! Filters domain - user-supplied filter specifications over pages
//!
//! # Components
//!
//! - `column` - identifier allow-list
//! - `value` - typed filter operands
//! - `spec` - parsed specifications (equality maps and filter groups)
//! - `compiler` - parameterized PostgreSQL predicates
//! - `evaluator` - the same semantics over in-memory rows

pub mod column;
pub mod compiler;
pub mod evaluator;
pub mod spec;
pub mod value;

use thiserror::Error;

pub use column::Column;
pub use compiler::{
    compile_any_of, compile_entry, compile_pages_where, compile_spec, push_argument, PageScope,
    Predicate,
};
pub use evaluator::{matches_any, matches_entry, matches_spec, FilterRow};
pub use spec::{Condition, FilterEntry, FilterGroup, FilterSpec, Operator};
pub use value::{FilterScalar, FilterValue};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid filter column: {0:?}")]
    InvalidFilterColumn(String),

    #[error("Unsupported filter operator: {0:?}")]
    UnsupportedOperator(String),

    #[error("Malformed filter specification: {0}")]
    MalformedSpecification(String),
}
