//! The document tree.

use crate::number::Number;
use indexmap::IndexMap;

/// Object members in document order.
pub type Object = IndexMap<String, Value>;

/// A schema-less document tree.
///
/// Objects keep their members in insertion order; traversal, flattening and
/// the binary encoding all preserve it. Equality is structural: numbers
/// compare by value (see [`Number`]) and objects compare as maps, so member
/// order does not affect `==`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JSON `null`.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number.
    Number(Number),
    /// JSON string.
    String(String),
    /// JSON array.
    Array(Vec<Value>),
    /// JSON object.
    Object(Object),
}

impl Value {
    /// Creates an empty object.
    #[must_use]
    pub fn object() -> Self {
        Self::Object(Object::new())
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Returns true for `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for arrays and objects.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a number, if it is one.
    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(Number::as_i64)
    }

    /// Get this value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as an object, if it is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Mutable access to the members of an object.
    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Mutable access to the items of an array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Looks up an object member.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Looks up an object member mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_object_mut().and_then(|o| o.get_mut(key))
    }

    /// Sets an object member, returning the previous value.
    ///
    /// Existing members keep their position; new members are appended.
    /// Returns `None` without effect if `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.as_object_mut()
            .and_then(|o| o.insert(key.into(), value.into()))
    }

    /// Removes an object member, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.as_object_mut().and_then(|o| o.shift_remove(key))
    }

    /// Returns true if every number in the tree is finite.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Array(items) => items.iter().all(Value::is_storable),
            Self::Object(members) => members.values().all(Value::is_storable),
            Self::Null | Self::Bool(_) | Self::String(_) => true,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(Number::Integer(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Number(Number::Float(f))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Self::Number(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Value {
        [("name", Value::from("Ann")), ("score", Value::from(10))].into_iter().collect()
    }

    #[test]
    fn object_members_keep_insertion_order() {
        let mut doc = person();
        doc.insert("cheat", true);
        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "score", "cheat"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut doc = person();
        let old = doc.insert("name", "Bob");
        assert_eq!(old, Some(Value::from("Ann")));
        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "score"]);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut doc = person();
        doc.insert("level", 3);
        assert_eq!(doc.remove("score"), Some(Value::from(10)));
        let keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "level"]);
    }

    #[test]
    fn insert_on_non_object_is_ignored() {
        let mut v = Value::from(1);
        assert_eq!(v.insert("a", 1), None);
        assert_eq!(v, Value::from(1));
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(4.0).as_i64(), Some(4));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(person().get("score"), Some(&Value::from(10)));
        assert_eq!(
            Value::from(vec![1, 2]).as_array().map(<[Value]>::len),
            Some(2)
        );
        assert!(Value::object().is_container());
        assert_eq!(Value::from(Some("a")), Value::from("a"));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn storable_rejects_nested_nan() {
        assert!(person().is_storable());
        let mut doc = person();
        doc.insert("bad", Value::from(vec![Value::from(f64::NAN)]));
        assert!(!doc.is_storable());
    }

    #[test]
    fn numbers_equal_across_representations() {
        assert_eq!(Value::from(20), Value::from(20.0));
        assert_ne!(Value::from(20), Value::from("20"));
    }
}
