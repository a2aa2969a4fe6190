use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Column name to value map used for primary-key projections, change sets and
/// insert rows. Ordered by column name so everything built from it is
/// deterministic.
pub type ColumnValues = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Text,
    /// Anything the engine does not model; values travel as `Value::Raw`.
    Other(String),
}

impl ColumnType {
    /// Classifies a declared type name as reported by PostgreSQL
    /// (`format_type`) or SQLite (`pragma_table_info`).
    pub fn from_declared(declared: &str) -> Self {
        let lowered = declared.trim().to_ascii_lowercase();
        let base = match lowered.find('(') {
            Some(pos) => lowered[..pos].trim_end(),
            None => lowered.as_str(),
        };
        match base {
            "bool" | "boolean" => ColumnType::Boolean,
            "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "tinyint"
            | "mediumint" | "unsigned big int" | "serial" | "serial2" | "serial4" | "serial8"
            | "smallserial" | "bigserial" => ColumnType::Integer,
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => {
                ColumnType::Float
            }
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
            | "name" | "clob" | "nvarchar" | "nchar" | "citext" => ColumnType::Text,
            _ => ColumnType::Other(declared.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(CompactString),
    /// Pre-rendered text for types outside the modeled scalar set (dates,
    /// numeric, json, arrays). Formatted exactly like `Text`.
    Raw(CompactString),
}

impl Value {
    pub fn text(value: impl Into<CompactString>) -> Self {
        Value::Text(value.into())
    }

    pub fn raw(value: impl Into<CompactString>) -> Self {
        Value::Raw(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Raw(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::Text(_) | Value::Raw(_) => 3,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
            (Value::Integer(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_int_float(*b, *a).reverse(),
            (Value::Text(a) | Value::Raw(a), Value::Text(b) | Value::Raw(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Signed zeroes are equal, matching their integer counterpart `0`.
fn cmp_floats(a: f64, b: f64) -> Ordering {
    if a == b { Ordering::Equal } else { a.total_cmp(&b) }
}

/// Exact comparison without rounding `int` through `f64`. NaNs sort like
/// `total_cmp` places them: negative NaN first, positive NaN last.
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return if float.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if float >= TWO_POW_63 {
        return Ordering::Less;
    }
    if float < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    // In range, so the cast is exact.
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => cmp_floats(whole, float),
        unequal => unequal,
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One row of a loaded page, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: ColumnValues,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: ColumnValues) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Sets a column and returns the previous value.
    pub fn set(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(column.into(), value)
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &ColumnValues {
        &self.values
    }

    /// Projects the row onto `columns`; missing columns project to null.
    pub fn project<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> ColumnValues {
        columns
            .into_iter()
            .map(|c| {
                (
                    c.to_string(),
                    self.values.get(c).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, Row, Value};
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<i64>().prop_map(Value::Integer),
            any::<f64>()
                .prop_filter("finite float only", |v| v.is_finite())
                .prop_map(Value::Float),
            "\\PC{0,32}".prop_map(|s| Value::Text(s.into())),
        ]
    }

    /// Numbers clustered around 2^53 and the ends of the i64 range, where an
    /// `i64 as f64` cast stops being exact.
    fn arb_wide_number() -> impl Strategy<Value = Value> {
        let two_53 = 1i64 << 53;
        prop_oneof![
            (-4i64..=4).prop_map(move |d| Value::Integer(two_53 + d)),
            (-4i64..=4).prop_map(move |d| Value::Float((two_53 + d) as f64)),
            (0i64..=4).prop_map(|d| Value::Integer(i64::MAX - d)),
            (0i64..=4).prop_map(|d| Value::Integer(i64::MIN + d)),
            Just(Value::Float(9_223_372_036_854_775_808.0)),
            Just(Value::Float(-9_223_372_036_854_775_808.0)),
            Just(Value::Float(0.5)),
            Just(Value::Float(-0.0)),
            Just(Value::Integer(0)),
            any::<i64>().prop_map(Value::Integer),
        ]
    }

    proptest! {
        #[test]
        fn wide_numbers_keep_equality_transitive(
            a in arb_wide_number(),
            b in arb_wide_number(),
            c in arb_wide_number(),
        ) {
            if a == b && b == c {
                prop_assert_eq!(&a, &c);
            }
            if a < b && b < c {
                prop_assert!(a < c);
            }
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }

        #[test]
        fn integer_equals_float_only_when_exact(offset in 0i64..=1024) {
            let int = (1i64 << 53) + offset;
            let float = int as f64;
            let exact = float as i128 == i128::from(int);
            prop_assert_eq!(Value::Integer(int) == Value::Float(float), exact);
        }

        #[test]
        fn json_wire_form_preserves_value(v in arb_value()) {
            let json = serde_json::to_string(&v).expect("encode should succeed");
            let decoded: Value = serde_json::from_str(&json).expect("decode should succeed");
            prop_assert_eq!(v, decoded);
        }

        #[test]
        fn ordering_is_antisymmetric(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }
    }

    #[test]
    fn wire_form_is_untagged() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Boolean(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Value::Integer(-7)).unwrap(), "-7");
        assert_eq!(serde_json::to_string(&Value::text("a'b")).unwrap(), "\"a'b\"");
        assert_eq!(
            serde_json::to_string(&Value::raw("2024-01-01")).unwrap(),
            "\"2024-01-01\""
        );
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert_eq!(Value::Integer(3), Value::Float(3.0));
        assert!(Value::Integer(2) < Value::Float(2.5));
        assert_ne!(Value::Integer(1), Value::text("1"));
    }

    #[test]
    fn integers_past_two_pow_53_do_not_collapse_onto_floats() {
        let float = Value::Float(9_007_199_254_740_992.0);
        assert_eq!(Value::Integer(9_007_199_254_740_992), float);
        assert_ne!(Value::Integer(9_007_199_254_740_993), float);
        assert!(Value::Integer(9_007_199_254_740_993) > float);
        assert!(Value::Integer(i64::MAX) < Value::Float(9_223_372_036_854_775_808.0));
        assert_eq!(Value::Integer(i64::MIN), Value::Float(-9_223_372_036_854_775_808.0));
        assert_eq!(Value::Float(-0.0), Value::Integer(0));
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert!(Value::Integer(-1) < Value::Float(-0.5));
    }

    #[test]
    fn raw_and_text_with_same_content_are_equal() {
        assert_eq!(Value::raw("12.50"), Value::text("12.50"));
    }

    #[test]
    fn declared_types_are_classified() {
        assert_eq!(ColumnType::from_declared("boolean"), ColumnType::Boolean);
        assert_eq!(ColumnType::from_declared("INTEGER"), ColumnType::Integer);
        assert_eq!(ColumnType::from_declared("bigint"), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_declared("double precision"),
            ColumnType::Float
        );
        assert_eq!(
            ColumnType::from_declared("character varying(100)"),
            ColumnType::Text
        );
        assert_eq!(
            ColumnType::from_declared("interval"),
            ColumnType::Other("interval".into())
        );
        assert_eq!(
            ColumnType::from_declared("numeric(10,2)"),
            ColumnType::Other("numeric(10,2)".into())
        );
    }

    #[test]
    fn projection_fills_missing_columns_with_null() {
        let row = Row::new().with("id", 1).with("name", "a");
        let key = row.project(["id", "tenant"]);
        assert_eq!(key.get("id"), Some(&Value::Integer(1)));
        assert_eq!(key.get("tenant"), Some(&Value::Null));
        assert_eq!(key.len(), 2);
    }
}
