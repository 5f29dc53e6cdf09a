//! Parsed filter specifications.
//!
//! Wire shape (a JSON array mixing two entry kinds):
//!
//! ```json
//! [
//!   {"depth": 1, "og_title": null},
//!   {"filters": [{"name": "response_code", "operator": "gte", "value": 400}]}
//! ]
//! ```
//!
//! Top-level entries are ANDed, conditions inside a group are ANDed.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::{Column, FilterError, FilterScalar, FilterValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    IsNull,
    NotNull,
    Contains,
    In,
}

impl FromStr for Operator {
    type Err = FilterError;

    /// Names are trimmed and case-insensitive; blank means `eq`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "eq" => Ok(Operator::Eq),
            "neq" => Ok(Operator::Neq),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "isnull" => Ok(Operator::IsNull),
            "notnull" => Ok(Operator::NotNull),
            "contains" => Ok(Operator::Contains),
            "in" => Ok(Operator::In),
            _ => Err(FilterError::UnsupportedOperator(s.to_string())),
        }
    }
}

/// One `{"name", "operator", "value"}` condition inside a filter group.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: Column,
    pub operator: Operator,
    pub value: FilterValue,
}

impl Condition {
    pub fn new(column: Column, operator: Operator, value: FilterValue) -> Result<Self, FilterError> {
        let value = match (operator, value) {
            (Operator::IsNull | Operator::NotNull, _) => FilterValue::Null,
            (Operator::Eq | Operator::Neq, FilterValue::List(_)) => {
                return Err(malformed(&column, "expects a single value, not a list"))
            }
            (Operator::Eq | Operator::Neq, value) => value,
            (Operator::In, value @ FilterValue::List(_)) => value,
            (Operator::In, _) => return Err(malformed(&column, "operator in expects a list")),
            (_, value @ FilterValue::Scalar(_)) => value,
            (op, _) => {
                return Err(malformed(
                    &column,
                    &format!("operator {op:?} expects a non-null scalar value"),
                ))
            }
        };
        Ok(Self {
            column,
            operator,
            value,
        })
    }

    /// An `in` over an empty list places no constraint and compiles to nothing.
    pub fn is_omitted(&self) -> bool {
        self.operator == Operator::In
            && matches!(&self.value, FilterValue::List(items) if items.is_empty())
    }

    fn from_json(item: &Value) -> Result<Self, FilterError> {
        let object = item.as_object().ok_or_else(|| {
            FilterError::MalformedSpecification("each group filter must be an object".to_string())
        })?;

        let name = match object.get("name") {
            Some(Value::String(name)) => name.as_str(),
            None | Some(Value::Null) => "",
            Some(_) => {
                return Err(FilterError::MalformedSpecification(
                    "filter name must be a string".to_string(),
                ))
            }
        };
        let column = Column::parse(name)?;

        let operator = match object.get("operator") {
            Some(Value::String(op)) => op.parse()?,
            None | Some(Value::Null) => Operator::Eq,
            Some(other) => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };

        let value = FilterValue::from_json(object.get("value").unwrap_or(&Value::Null))?;
        Condition::new(column, operator, value)
    }
}

fn malformed(column: &Column, reason: &str) -> FilterError {
    FilterError::MalformedSpecification(format!("filter on {column} {reason}"))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGroup {
    pub conditions: Vec<Condition>,
}

impl FilterGroup {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn is_vacuous(&self) -> bool {
        self.conditions.iter().all(Condition::is_omitted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterEntry {
    /// `{column: value}`; `None` means `IS NULL`. Sorted so output is deterministic.
    Equality(BTreeMap<Column, Option<FilterScalar>>),
    Group(FilterGroup),
}

impl FilterEntry {
    /// A vacuous entry constrains nothing: it is dropped from ANDs and
    /// contributes no rows to ORs.
    pub fn is_vacuous(&self) -> bool {
        match self {
            FilterEntry::Equality(map) => map.is_empty(),
            FilterEntry::Group(group) => group.is_vacuous(),
        }
    }

    fn from_object(object: &Map<String, Value>) -> Result<Self, FilterError> {
        if let Some(filters) = object.get("filters") {
            let items = filters.as_array().ok_or_else(|| {
                FilterError::MalformedSpecification(
                    "filter group \"filters\" must be a list".to_string(),
                )
            })?;
            let conditions = items
                .iter()
                .map(Condition::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(FilterEntry::Group(FilterGroup::new(conditions)));
        }

        let mut map = BTreeMap::new();
        for (key, value) in object {
            let column = Column::parse(key)?;
            let scalar = FilterScalar::from_json(value).map_err(|_| {
                FilterError::MalformedSpecification(format!(
                    "equality filter on {column} expects a scalar or null"
                ))
            })?;
            map.insert(column, scalar);
        }
        Ok(FilterEntry::Equality(map))
    }
}

/// A validated list of filter entries.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct FilterSpec {
    entries: Vec<FilterEntry>,
}

impl FilterSpec {
    pub fn new(entries: Vec<FilterEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a JSON array of entries. `null` is an empty specification and
    /// `null` items are skipped.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        let entries = parse_items(value)?.into_iter().collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    /// Parses entry by entry, keeping the valid ones and returning the error
    /// of each rejected entry. Only a value that is not a list fails outright.
    pub fn parse_valid(value: &Value) -> Result<(Self, Vec<FilterError>), FilterError> {
        let mut entries = Vec::new();
        let mut rejected = Vec::new();
        for item in parse_items(value)? {
            match item {
                Ok(entry) => entries.push(entry),
                Err(e) => rejected.push(e),
            }
        }
        Ok((Self { entries }, rejected))
    }

    pub fn parse_str(raw: &str) -> Result<Self, FilterError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| FilterError::MalformedSpecification(e.to_string()))?;
        Self::parse(&value)
    }

    /// Reads the `filter_groups` list out of an audit check or view
    /// `filter_config`. A config without the key has no groups.
    pub fn from_filter_config(config: &Value) -> Result<Self, FilterError> {
        Self::parse(filter_groups_of(config)?)
    }

    /// [`FilterSpec::from_filter_config`] that drops invalid groups instead of
    /// failing on the first one.
    pub fn from_filter_config_valid(config: &Value) -> Result<(Self, Vec<FilterError>), FilterError> {
        Self::parse_valid(filter_groups_of(config)?)
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_items(value: &Value) -> Result<Vec<Result<FilterEntry, FilterError>>, FilterError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(FilterError::MalformedSpecification(
                "filters must be a list".to_string(),
            ))
        }
    };

    Ok(items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| match item {
            Value::Object(object) => FilterEntry::from_object(object),
            _ => Err(FilterError::MalformedSpecification(
                "each filter entry must be an object".to_string(),
            )),
        })
        .collect())
}

static NO_GROUPS: Value = Value::Null;

fn filter_groups_of(config: &Value) -> Result<&Value, FilterError> {
    match config {
        Value::Null => Ok(&NO_GROUPS),
        Value::Object(object) => Ok(object.get("filter_groups").unwrap_or(&NO_GROUPS)),
        _ => Err(FilterError::MalformedSpecification(
            "filter_config must be an object".to_string(),
        )),
    }
}

impl TryFrom<Value> for FilterSpec {
    type Error = FilterError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_names_are_normalized() {
        assert_eq!(" GTE ".parse::<Operator>().unwrap(), Operator::Gte);
        assert_eq!("".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("NotNull".parse::<Operator>().unwrap(), Operator::NotNull);
        assert!(matches!(
            "like".parse::<Operator>(),
            Err(FilterError::UnsupportedOperator(op)) if op == "like"
        ));
    }

    #[test]
    fn test_parses_both_entry_shapes() {
        let spec = FilterSpec::parse(&json!([
            {"depth": 1, "og_title": null},
            null,
            {"filters": [{"name": "response_code", "operator": "gte", "value": 400}]}
        ]))
        .unwrap();

        assert_eq!(spec.entries().len(), 2);
        match &spec.entries()[0] {
            FilterEntry::Equality(map) => {
                let keys: Vec<_> = map.keys().map(Column::as_str).collect();
                assert_eq!(keys, vec!["depth", "og_title"]);
                assert_eq!(map[&Column::known("og_title")], None);
            }
            other => panic!("expected equality map, got {other:?}"),
        }
        match &spec.entries()[1] {
            FilterEntry::Group(group) => {
                assert_eq!(group.conditions[0].operator, Operator::Gte);
                assert_eq!(group.conditions[0].value, FilterValue::integer(400));
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_operator_defaults_to_eq() {
        let spec = FilterSpec::parse(&json!([{"filters": [{"name": "depth", "value": 2}]}])).unwrap();
        let FilterEntry::Group(group) = &spec.entries()[0] else {
            panic!("expected group");
        };
        assert_eq!(group.conditions[0].operator, Operator::Eq);
    }

    #[test]
    fn test_rejects_bad_columns_anywhere() {
        let in_map = FilterSpec::parse(&json!([{"depth; --": 1}]));
        assert!(matches!(in_map, Err(FilterError::InvalidFilterColumn(_))));

        let in_group = FilterSpec::parse(&json!([{"filters": [{"name": "a b", "value": 1}]}]));
        assert!(matches!(in_group, Err(FilterError::InvalidFilterColumn(_))));

        let unnamed = FilterSpec::parse(&json!([{"filters": [{"value": 1}]}]));
        assert!(matches!(unnamed, Err(FilterError::InvalidFilterColumn(_))));
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        for bad in [
            json!({"depth": 1}),
            json!([1]),
            json!([{"filters": "nope"}]),
            json!([{"filters": [1]}]),
            json!([{"depth": [1, 2]}]),
            json!([{"depth": {"gt": 1}}]),
            json!([{"filters": [{"name": "depth", "operator": "in", "value": 3}]}]),
            json!([{"filters": [{"name": "depth", "operator": "gt", "value": null}]}]),
            json!([{"filters": [{"name": "url", "operator": "contains"}]}]),
        ] {
            assert!(
                matches!(FilterSpec::parse(&bad), Err(FilterError::MalformedSpecification(_))),
                "{bad} should be malformed"
            );
        }
    }

    #[test]
    fn test_empty_in_list_is_vacuous() {
        let spec = FilterSpec::parse(&json!([
            {"filters": [{"name": "response_code", "operator": "in", "value": []}]}
        ]))
        .unwrap();
        assert!(spec.entries()[0].is_vacuous());
    }

    #[test]
    fn test_filter_config_groups() {
        let config = json!({"filter_groups": [{"filters": [{"name": "depth", "operator": "gt", "value": 3}]}]});
        assert_eq!(FilterSpec::from_filter_config(&config).unwrap().entries().len(), 1);
        assert!(FilterSpec::from_filter_config(&json!({})).unwrap().is_empty());
        assert!(FilterSpec::from_filter_config(&json!("x")).is_err());
    }

    #[test]
    fn test_parse_valid_keeps_good_groups() {
        let config = json!({"filter_groups": [
            {"depth": 1},
            {"filters": [{"name": "no such; column", "value": 1}]},
            "not an object",
            {"filters": [{"name": "response_code", "operator": "gte", "value": 500}]}
        ]});

        let (spec, rejected) = FilterSpec::from_filter_config_valid(&config).unwrap();
        assert_eq!(spec.entries().len(), 2);
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0], FilterError::InvalidFilterColumn(_)));

        assert!(FilterSpec::from_filter_config(&config).is_err());
        assert!(FilterSpec::from_filter_config_valid(&json!({"filter_groups": 3})).is_err());
    }

    #[test]
    fn test_deserializes_from_json_text() {
        let spec: FilterSpec = serde_json::from_str(r#"[{"depth": 1}]"#).unwrap();
        assert_eq!(spec.entries().len(), 1);
        assert!(serde_json::from_str::<FilterSpec>(r#"[{"a-b": 1}]"#).is_err());
    }
}
