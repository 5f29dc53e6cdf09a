//! Compiles filter specifications into parameterized PostgreSQL predicates
//! over the `pages` table.
//!
//! Every predicate is self-contained: its placeholders start at `$1` and line
//! up with its own argument list. Predicates are combined with [`Predicate::and`]
//! and [`Predicate::any_of`], which shift the right-hand placeholders past the
//! arguments already collected.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use sqlx::postgres::PgArguments;
use sqlx::Arguments;

use super::{Condition, FilterEntry, FilterGroup, FilterScalar, FilterSpec, FilterValue, Operator};
use crate::common::SessionId;

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\$(\d+)").expect("placeholder pattern is valid");
}

/// A SQL boolean expression plus the arguments for its `$n` placeholders.
/// An empty predicate constrains nothing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    sql: String,
    args: Vec<FilterScalar>,
}

impl Predicate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[FilterScalar] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<FilterScalar>) {
        (self.sql, self.args)
    }

    /// Rewrites `$n` to `$(n + offset)`, for appending after `offset`
    /// arguments that belong to another predicate.
    pub fn shifted(&self, offset: usize) -> Self {
        if offset == 0 {
            return self.clone();
        }
        let sql = PLACEHOLDER_REGEX
            .replace_all(&self.sql, |caps: &Captures| {
                let n: usize = caps[1].parse().unwrap_or(0);
                format!("${}", n + offset)
            })
            .into_owned();
        Self {
            sql,
            args: self.args.clone(),
        }
    }

    /// `self AND other`. Empty operands are dropped.
    pub fn and(self, other: Predicate) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        let shifted = other.shifted(self.args.len());
        let mut args = self.args;
        args.extend(shifted.args);
        Self {
            sql: format!("{} AND {}", self.sql, shifted.sql),
            args,
        }
    }

    /// `((a) OR (b) ...)` over the non-empty parts. Empty when no part
    /// constrains anything.
    pub fn any_of(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut sql_parts = Vec::new();
        let mut args = Vec::new();
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            let shifted = part.shifted(args.len());
            sql_parts.push(format!("({})", shifted.sql));
            args.extend(shifted.args);
        }
        if sql_parts.is_empty() {
            return Self::empty();
        }
        Self {
            sql: format!("({})", sql_parts.join(" OR ")),
            args,
        }
    }

    /// Arguments for `sqlx::query_with`, in placeholder order.
    pub fn arguments(&self) -> Result<PgArguments, sqlx::Error> {
        let mut arguments = PgArguments::default();
        for arg in &self.args {
            push_argument(&mut arguments, arg)?;
        }
        Ok(arguments)
    }

    fn push_arg(&mut self, arg: FilterScalar) -> usize {
        self.args.push(arg);
        self.args.len()
    }
}

// =============================================================================
// Scope
// =============================================================================

/// The sessions whose pages a query ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum PageScope {
    Session(SessionId),
    Sessions(Vec<SessionId>),
}

impl PageScope {
    /// A session and, optionally, the session it is compared against.
    pub fn with_comparison(session_id: SessionId, comparison: Option<SessionId>) -> Self {
        match comparison {
            Some(other) if other != session_id => PageScope::Sessions(vec![session_id, other]),
            _ => PageScope::Session(session_id),
        }
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        match self {
            PageScope::Session(id) => *id == session_id,
            PageScope::Sessions(ids) => ids.contains(&session_id),
        }
    }

    pub fn predicate(&self) -> Predicate {
        let mut predicate = Predicate::empty();
        match self {
            PageScope::Session(id) => {
                let n = predicate.push_arg(FilterScalar::Integer(id.as_i64()));
                predicate.sql = format!("crawling_session_id = ${n}");
            }
            PageScope::Sessions(ids) => {
                let placeholders: Vec<String> = ids
                    .iter()
                    .map(|id| format!("${}", predicate.push_arg(FilterScalar::Integer(id.as_i64()))))
                    .collect();
                predicate.sql = if placeholders.is_empty() {
                    "FALSE".to_string()
                } else {
                    format!("crawling_session_id IN ({})", placeholders.join(", "))
                };
            }
        }
        predicate
    }
}

// =============================================================================
// Compilation
// =============================================================================

pub fn compile_condition(condition: &Condition) -> Predicate {
    let mut predicate = Predicate::empty();
    let column = condition.column.as_str();

    let sql = match (&condition.operator, &condition.value) {
        (Operator::Eq, FilterValue::Null) => format!("{column} IS NULL"),
        (Operator::Neq, FilterValue::Null) => format!("{column} IS NOT NULL"),
        (Operator::IsNull, _) => format!("{column} IS NULL"),
        (Operator::NotNull, _) => format!("{column} IS NOT NULL"),
        (Operator::In, FilterValue::List(items)) => {
            if items.is_empty() {
                return predicate;
            }
            let placeholders: Vec<String> = items
                .iter()
                .map(|item| format!("${}", predicate.push_arg(item.clone())))
                .collect();
            format!("{column} IN ({})", placeholders.join(", "))
        }
        (Operator::Contains, FilterValue::Scalar(value)) => {
            let n = predicate.push_arg(FilterScalar::Text(escape_like(&value.as_text())));
            format!("{column}::text ILIKE '%' || ${n} || '%'")
        }
        (op, FilterValue::Scalar(value)) => {
            let n = predicate.push_arg(value.clone());
            let symbol = match op {
                Operator::Eq => "=",
                Operator::Neq => "<>",
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Lt => "<",
                Operator::Lte => "<=",
                // Unreachable: handled above or rejected by Condition::new
                _ => return Predicate::empty(),
            };
            format!("{column} {symbol} ${n}")
        }
        // Condition::new never builds the remaining shapes
        _ => return Predicate::empty(),
    };

    predicate.sql = sql;
    predicate
}

fn compile_group(group: &FilterGroup) -> Predicate {
    let inner = group
        .conditions
        .iter()
        .map(compile_condition)
        .fold(Predicate::empty(), Predicate::and);
    if inner.is_empty() {
        return inner;
    }
    Predicate {
        sql: format!("({})", inner.sql),
        args: inner.args,
    }
}

pub fn compile_entry(entry: &FilterEntry) -> Predicate {
    match entry {
        FilterEntry::Group(group) => compile_group(group),
        FilterEntry::Equality(map) => {
            let mut predicate = Predicate::empty();
            let mut clauses = Vec::with_capacity(map.len());
            for (column, value) in map {
                match value {
                    None => clauses.push(format!("{column} IS NULL")),
                    Some(value) => {
                        let n = predicate.push_arg(value.clone());
                        clauses.push(format!("{column} = ${n}"));
                    }
                }
            }
            predicate.sql = clauses.join(" AND ");
            predicate
        }
    }
}

/// All entries ANDed together.
pub fn compile_spec(spec: &FilterSpec) -> Predicate {
    spec.entries()
        .iter()
        .map(compile_entry)
        .fold(Predicate::empty(), Predicate::and)
}

/// Entries ORed together; vacuous entries match nothing here.
pub fn compile_any_of(entries: &[FilterEntry]) -> Predicate {
    Predicate::any_of(entries.iter().map(compile_entry))
}

/// `WHERE` body for a pages query: scope first, then each specification in order.
pub fn compile_pages_where(scope: &PageScope, specs: &[&FilterSpec]) -> Predicate {
    specs
        .iter()
        .map(|spec| compile_spec(spec))
        .fold(scope.predicate(), Predicate::and)
}

/// Binds one scalar with its natural PostgreSQL type.
pub fn push_argument(arguments: &mut PgArguments, arg: &FilterScalar) -> Result<(), sqlx::Error> {
    let result = match arg {
        FilterScalar::Bool(b) => arguments.add(*b),
        FilterScalar::Integer(i) => arguments.add(*i),
        FilterScalar::Float(f) => arguments.add(*f),
        FilterScalar::Text(s) => arguments.add(s.clone()),
    };
    result.map_err(sqlx::Error::Encode)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
