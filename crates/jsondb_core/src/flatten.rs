//! Projection of documents into flat entries.
//!
//! Every scalar leaf of a document becomes one [`FlatEntry`] holding the
//! document identifier, the leaf's [`Path`] and its [`Scalar`] value.
//! Containers contribute nothing themselves, so empty objects and arrays
//! produce no entries.

use crate::document::DocumentId;
use crate::path::Path;
use crate::traverse::{traverse, Event, TraverseKinds, Visitor};
use jsondb_codec::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Type tag of a scalar, in sort rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarType {
    /// `null`
    Null,
    /// `true`/`false`
    Boolean,
    /// Integers and floats.
    Number,
    /// Text.
    String,
}

impl ScalarType {
    /// Smallest scalar of this type.
    #[must_use]
    pub fn min_value(self) -> Scalar {
        match self {
            Self::Null => Scalar::Null,
            Self::Boolean => Scalar::Bool(false),
            Self::Number => Scalar::Number(Number::Float(f64::NEG_INFINITY)),
            Self::String => Scalar::String(String::new()),
        }
    }

    /// Largest scalar of this type. Strings have no largest value.
    #[must_use]
    pub fn max_value(self) -> Option<Scalar> {
        match self {
            Self::Null => Some(Scalar::Null),
            Self::Boolean => Some(Scalar::Bool(true)),
            Self::Number => Some(Scalar::Number(Number::Float(f64::INFINITY))),
            Self::String => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
        })
    }
}

/// A typed leaf value.
///
/// Ordered by type rank first (`null < boolean < number < string`), then by
/// value within the type. Integers and floats share the number type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    /// `null`
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(String),
}

impl Scalar {
    /// Returns the leaf value of `value`, or `None` for containers.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(*n)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the type tag.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Null => ScalarType::Null,
            Self::Bool(_) => ScalarType::Boolean,
            Self::Number(_) => ScalarType::Number,
            Self::String(_) => ScalarType::String,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts back to a document value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(*n),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_value(), f)
    }
}

/// One leaf of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    /// Owning document.
    pub document_id: DocumentId,
    /// Location of the leaf.
    pub path: Path,
    /// Value of the leaf.
    pub scalar: Scalar,
}

impl FlatEntry {
    /// Returns the type tag of the value.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar.scalar_type()
    }
}

struct Flattener<'id> {
    document_id: &'id DocumentId,
    entries: Vec<FlatEntry>,
}

impl Visitor for Flattener<'_> {
    fn visit(&mut self, event: &Event<'_>) {
        if let Some(scalar) = Scalar::from_value(event.value) {
            self.entries.push(FlatEntry {
                document_id: self.document_id.clone(),
                path: event.path.clone(),
                scalar,
            });
        }
    }
}

/// Produces the flat entries of one document, in traversal order.
#[must_use]
pub fn flatten(document_id: &DocumentId, document: &Value) -> Vec<FlatEntry> {
    let mut flattener = Flattener {
        document_id,
        entries: Vec::new(),
    };
    traverse(document, TraverseKinds::VALUE, &mut flattener);
    flattener.entries
}

/// The flat entries of a document grouped for lookup.
///
/// `values` maps each exact path, and each element path of a path crossing
/// an array, to the scalars found there in traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatDocument {
    entries: Vec<FlatEntry>,
    values: BTreeMap<String, Vec<Scalar>>,
}

impl FlatDocument {
    /// Flattens `document`.
    #[must_use]
    pub fn new(document_id: &DocumentId, document: &Value) -> Self {
        Self::from_entries(flatten(document_id, document))
    }

    /// Groups already flattened entries.
    #[must_use]
    pub fn from_entries(entries: Vec<FlatEntry>) -> Self {
        let mut values: BTreeMap<String, Vec<Scalar>> = BTreeMap::new();
        for entry in &entries {
            values
                .entry(entry.path.to_string())
                .or_default()
                .push(entry.scalar.clone());
            if entry.path.has_index() {
                values
                    .entry(entry.path.element_path())
                    .or_default()
                    .push(entry.scalar.clone());
            }
        }
        Self { entries, values }
    }

    /// Returns the entries in traversal order.
    #[must_use]
    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    /// Returns the scalars addressed by `path`.
    #[must_use]
    pub fn values_at(&self, path: &str) -> &[Scalar] {
        self.values.get(path).map_or(&[][..], Vec::as_slice)
    }

    /// Returns the first scalar addressed by `path`.
    #[must_use]
    pub fn first_at(&self, path: &str) -> Option<&Scalar> {
        self.values_at(path).first()
    }

    /// Iterates over every addressable path and its scalars.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &[Scalar])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns true if the document has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Segment;

    fn doc(text: &str) -> Value {
        Value::from_json_str(text).unwrap()
    }

    #[test]
    fn flatten_nested_document() {
        let id = DocumentId::from(1);
        let entries = flatten(
            &id,
            &doc(r#"{"name": "Ann", "score": 10, "tags": ["a", "b"], "address": {"city": null}}"#),
        );
        let rendered: Vec<(String, ScalarType)> = entries
            .iter()
            .map(|e| (e.path.to_string(), e.scalar_type()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("name".to_string(), ScalarType::String),
                ("score".to_string(), ScalarType::Number),
                ("tags.0".to_string(), ScalarType::String),
                ("tags.1".to_string(), ScalarType::String),
                ("address.city".to_string(), ScalarType::Null),
            ]
        );
        assert!(entries.iter().all(|e| e.document_id == id));
        assert_eq!(
            entries[2].path.segments(),
            &[Segment::Key("tags".into()), Segment::Index(0)]
        );
    }

    #[test]
    fn empty_containers_produce_nothing() {
        let id = DocumentId::from("x");
        assert!(flatten(&id, &doc(r#"{"a": {}, "b": [], "c": [[], {}]}"#)).is_empty());
        assert!(flatten(&id, &Value::object()).is_empty());
    }

    #[test]
    fn element_paths_alias_array_members() {
        let flat = FlatDocument::new(
            &DocumentId::from(1),
            &doc(r#"{"tags": ["a", "b"], "pts": [{"x": 1}, {"x": 2}]}"#),
        );
        assert_eq!(
            flat.values_at("tags"),
            &[Scalar::String("a".into()), Scalar::String("b".into())]
        );
        assert_eq!(flat.values_at("tags.1"), &[Scalar::String("b".into())]);
        assert_eq!(
            flat.values_at("pts.x"),
            &[Scalar::Number(1.into()), Scalar::Number(2.into())]
        );
        assert!(flat.values_at("missing").is_empty());
        assert_eq!(flat.first_at("pts.1.x"), Some(&Scalar::Number(2.into())));
    }

    #[test]
    fn scalars_order_by_type_rank_then_value() {
        let mut values = vec![
            Scalar::String("a".into()),
            Scalar::Number(Number::Float(2.5)),
            Scalar::Bool(true),
            Scalar::Null,
            Scalar::Number(Number::Integer(2)),
            Scalar::Bool(false),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Bool(false),
                Scalar::Bool(true),
                Scalar::Number(Number::Integer(2)),
                Scalar::Number(Number::Float(2.5)),
                Scalar::String("a".into()),
            ]
        );
    }

    #[test]
    fn type_bounds_enclose_every_value_of_the_type() {
        let n = Scalar::Number(Number::Integer(i64::MIN));
        assert!(ScalarType::Number.min_value() <= n);
        assert!(Some(n) <= ScalarType::Number.max_value());
        assert!(ScalarType::String.min_value() <= Scalar::String(String::new()));
        assert!(ScalarType::Boolean.max_value().unwrap() < ScalarType::Number.min_value());
    }
}
