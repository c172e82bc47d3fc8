//! Typed property values
//!
//! Every decoded record value is coerced into [`Value`] before it is attached
//! to a mutation. Numbers are carried as `f64`, so integers beyond 2^53 lose
//! precision.
//!
//! Decoding back with [`Value::to_json`] preserves every value numerically,
//! but integral numbers inside the exact range come back as JSON integers:
//! `2.0` decodes as `2` and `-0.0` as `0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// Largest integer an `f64` represents exactly
pub const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A recursively structured property value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Decode back into an untyped JSON tree
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match exact_integer(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

/// Integral values inside the exact range are written without a fraction
fn exact_integer(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match exact_integer(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Coercion from an untyped decoded tree into [`Value`]
///
/// Returns `None` for any shape that has no `Value` counterpart. A list or map
/// holding such a shape anywhere inside it is rejected as a whole.
pub trait Wrap {
    fn wrap(&self) -> Option<Value>;
}

/// Coerce any supported decoded value
pub fn wrap<T: Wrap + ?Sized>(value: &T) -> Option<Value> {
    value.wrap()
}

fn wrap_number(n: Option<f64>, is_integer: bool) -> Option<Value> {
    let n = n.filter(|n| n.is_finite())?;
    if is_integer && n.abs() > MAX_EXACT_INTEGER {
        debug!(value = n, "wrap: integer exceeds f64 precision");
    }
    Some(Value::Number(n))
}

impl Wrap for serde_json::Value {
    fn wrap(&self) -> Option<Value> {
        match self {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => wrap_number(n.as_f64(), !n.is_f64()),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => items.iter().map(Wrap::wrap).collect::<Option<Vec<_>>>().map(Value::List),
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| v.wrap().map(|v| (k.clone(), v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::Map),
        }
    }
}

impl Wrap for serde_yaml::Value {
    fn wrap(&self) -> Option<Value> {
        match self {
            serde_yaml::Value::Null => Some(Value::Null),
            serde_yaml::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_yaml::Value::Number(n) => wrap_number(n.as_f64(), !n.is_f64()),
            serde_yaml::Value::String(s) => Some(Value::String(s.clone())),
            serde_yaml::Value::Sequence(items) => {
                items.iter().map(Wrap::wrap).collect::<Option<Vec<_>>>().map(Value::List)
            }
            serde_yaml::Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| match (k.as_str(), v.wrap()) {
                    (Some(k), Some(v)) => Some((k.to_string(), v)),
                    _ => None,
                })
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::Map),
            serde_yaml::Value::Tagged(tagged) => {
                debug!(tag = %tagged.tag, "wrap: tagged values are not supported");
                None
            }
        }
    }
}

impl Wrap for Value {
    fn wrap(&self) -> Option<Value> {
        Some(self.clone())
    }
}

impl Wrap for [String] {
    fn wrap(&self) -> Option<Value> {
        Some(Value::List(self.iter().cloned().map(Value::String).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_wrap_scalars() {
        assert_eq!(wrap(&json!("abc")), Some(Value::from("abc")));
        assert_eq!(wrap(&json!(true)), Some(Value::Bool(true)));
        assert_eq!(wrap(&json!(42)), Some(Value::Number(42.0)));
        assert_eq!(wrap(&json!(-1.5)), Some(Value::Number(-1.5)));
        assert_eq!(wrap(&json!(null)), Some(Value::Null));
    }

    #[test]
    fn test_wrap_heterogeneous_list_keeps_order() {
        let wrapped = wrap(&json!(["a", 1, false, {"k": "v"}])).unwrap();
        let items = wrapped.as_list().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Value::from("a"));
        assert_eq!(items[1], Value::Number(1.0));
        assert_eq!(items[2], Value::Bool(false));
        assert_eq!(items[3].as_map().unwrap()["k"], Value::from("v"));
    }

    #[test]
    fn test_wrap_string_list() {
        let tags = vec!["x".to_string(), "y".to_string()];
        assert_eq!(
            wrap(tags.as_slice()),
            Some(Value::List(vec![Value::from("x"), Value::from("y")]))
        );
    }

    #[test]
    fn test_wrap_yaml_rejects_non_string_keys() {
        let doc: serde_yaml::Value = serde_yaml::from_str("{1: a}").unwrap();
        assert_eq!(wrap(&doc), None);

        let nested: serde_yaml::Value = serde_yaml::from_str("outer: [{[1, 2]: x}]").unwrap();
        assert_eq!(wrap(&nested), None);
    }

    #[test]
    fn test_wrap_yaml_rejects_tagged_and_non_finite() {
        let tagged: serde_yaml::Value = serde_yaml::from_str("!custom 5").unwrap();
        assert_eq!(wrap(&tagged), None);

        let nan: serde_yaml::Value = serde_yaml::from_str(".nan").unwrap();
        assert_eq!(wrap(&nan), None);
    }

    #[test]
    fn test_wrap_yaml_map() {
        let doc: serde_yaml::Value = serde_yaml::from_str("name: TP53\nscore: 0.5").unwrap();
        let map = wrap(&doc).unwrap();
        let map = map.as_map().unwrap();
        assert_eq!(map["name"], Value::from("TP53"));
        assert_eq!(map["score"], Value::Number(0.5));
    }

    #[test]
    fn test_large_integer_loses_precision() {
        let big = json!(9_007_199_254_740_993u64);
        let wrapped = wrap(&big).unwrap();
        assert_ne!(wrapped.to_json(), big);
    }

    #[test]
    fn test_serialize_integral_number_without_fraction() {
        let v = Value::Map(BTreeMap::from([
            ("age".to_string(), Value::Number(42.0)),
            ("ratio".to_string(), Value::Number(0.25)),
        ]));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"age":42,"ratio":0.25}"#);
    }

    #[test]
    fn test_deserialize_value() {
        let v: Value = serde_json::from_str(r#"{"a": [1, "b", null, true]}"#).unwrap();
        let expected = Value::Map(BTreeMap::from([(
            "a".to_string(),
            Value::List(vec![
                Value::Number(1.0),
                Value::from("b"),
                Value::Null,
                Value::Bool(true),
            ]),
        )]));
        assert_eq!(v, expected);
    }

    fn json_strategy() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            (-1_000_000i64..1_000_000).prop_map(serde_json::Value::from),
            (-1.0e9f64..1.0e9).prop_map(serde_json::Value::from),
            "[a-z0-9 ]{0,8}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Structural equality with numbers compared as `f64`
    fn same_json(a: &serde_json::Value, b: &serde_json::Value) -> bool {
        use serde_json::Value as J;
        match (a, b) {
            (J::Number(x), J::Number(y)) => x.as_f64() == y.as_f64(),
            (J::Array(xs), J::Array(ys)) => xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_json(x, y)),
            (J::Object(xs), J::Object(ys)) => {
                xs.len() == ys.len() && xs.iter().all(|(k, x)| ys.get(k).is_some_and(|y| same_json(x, y)))
            }
            _ => a == b,
        }
    }

    #[test]
    fn test_integral_floats_decode_as_integers() {
        assert_eq!(wrap(&json!(2.0)).unwrap().to_json(), json!(2));
        assert_eq!(wrap(&json!(-0.0)).unwrap().to_json(), json!(0));
        assert_eq!(wrap(&json!({"a": 3.0})).unwrap().to_json(), json!({"a": 3}));
        assert_eq!(wrap(&json!(0.1)).unwrap().to_json(), json!(0.1));
    }

    proptest! {
        #[test]
        fn prop_wrap_round_trips(x in json_strategy()) {
            let back = wrap(&x).unwrap().to_json();
            prop_assert!(same_json(&back, &x), "{} decoded as {}", x, back);
        }
    }
}
