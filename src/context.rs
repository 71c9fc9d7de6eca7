use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::errors::Error;

/// The variable environment a template is rendered against.
///
/// Light wrapper around a `BTreeMap`: the top-level keys of the data payload
/// are the only names resolvable inside directives. This is an explicit
/// lookup table, there is no ambient scope injection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context {
    pub(crate) data: BTreeMap<String, Value>,
}

impl Context {
    /// Initializes an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON-encoded object into a context, one variable per
    /// top-level key.
    ///
    /// Fails with [`ErrorKind::PayloadParse`](crate::ErrorKind::PayloadParse)
    /// if the payload is not valid JSON or if its top level is not an object.
    pub fn from_json(payload: &str) -> crate::TmpletResult<Self> {
        let parsed: Value = serde_json::from_str(payload).map_err(Error::payload_parse)?;

        match parsed {
            Value::Object(map) => Ok(Self {
                data: map.into_iter().collect(),
            }),
            other => Err(Error::invalid_payload(format!(
                "expected a JSON object at the top level, got {}",
                crate::value::name(&other)
            ))),
        }
    }

    /// Takes something that implements Serialize and creates a context with it.
    /// Meant to be used if you have a hashmap or a struct and don't want to insert values
    /// one by one in the context.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> crate::TmpletResult<Self> {
        let val = serde_json::to_value(value)
            .map_err(|e| Error::chain("from_serialize failed to serialize the value", e))?;

        match val {
            Value::Object(map) => Ok(Self {
                data: map.into_iter().collect(),
            }),
            other => Err(Error::message(format!(
                "from_serialize requires a struct or map, got {}",
                crate::value::name(&other)
            ))),
        }
    }

    /// Converts the `val` parameter to a JSON value and inserts it into the context.
    ///
    /// Panics if the value cannot be serialized, like `serde_json::json!` does.
    pub fn insert<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, val: &T) {
        self.data.insert(
            key.into(),
            serde_json::to_value(val).expect("value failed to serialize"),
        );
    }

    /// In case you already have a `Value` you want to insert
    pub fn insert_value(&mut self, key: impl Into<String>, val: Value) {
        self.data.insert(key.into(), val);
    }

    /// Remove a key from the context, returning the value at the key if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Checks if a value exists for given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the value at the given key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn context_from_json() {
        let ctx = Context::from_json(r#"{"name": "Bob", "count": 3}"#).unwrap();
        assert_eq!(ctx.get("name").unwrap().as_str(), Some("Bob"));
        assert_eq!(ctx.get("count").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn context_from_bad_json_fails() {
        let err = Context::from_json("{bad").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::PayloadParse(_)));
    }

    #[test]
    fn context_from_non_object_json_fails() {
        let err = Context::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::PayloadParse(_)));
    }

    #[test]
    fn context_from_serialize() {
        use serde_derive::Serialize;

        #[derive(Serialize)]
        struct Person {
            name: String,
            age: i32,
        }

        let person = Person {
            name: "Alice".to_string(),
            age: 30,
        };
        let ctx = Context::from_serialize(&person).unwrap();

        assert!(ctx.contains_key("name"));
        assert_eq!(ctx.get("age").unwrap().as_i64(), Some(30));
    }

    #[test]
    fn context_from_serialize_non_map_fails() {
        let result = Context::from_serialize(&42);
        assert!(result.is_err());
    }
}
