//! Sort specifications.

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::flatten::{FlatDocument, Scalar};
use jsondb_codec::Value;
use std::cmp::Ordering;
use std::fmt;

/// Sort direction of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// One sort key: a field path and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Field path.
    pub path: String,
    /// Direction.
    pub direction: Direction,
}

/// An ordered list of sort keys.
///
/// Documents without a value at a key's path rank below every value,
/// `null` included. For paths holding several values (arrays) the first
/// value is the key. Ties on every key are broken by ascending identifier,
/// so the order is total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Identifier order.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds an ascending key.
    #[must_use]
    pub fn ascending(mut self, path: &str) -> Self {
        self.keys.push(SortKey {
            path: path.to_string(),
            direction: Direction::Ascending,
        });
        self
    }

    /// Adds a descending key.
    #[must_use]
    pub fn descending(mut self, path: &str) -> Self {
        self.keys.push(SortKey {
            path: path.to_string(),
            direction: Direction::Descending,
        });
        self
    }

    /// Parses a sort specification. Accepted forms:
    ///
    /// - `null`: identifier order
    /// - an array of `"field"` (ascending), `"-field"` (descending) or
    ///   `{"field": 1 | -1 | "asc" | "desc"}`
    /// - a single string, as a one-element array
    /// - an object `{"field": direction, ...}`, keys in order
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSort`] if the specification is malformed.
    pub fn parse(sort: &Value) -> CoreResult<Self> {
        let mut spec = Self::default();
        match sort {
            Value::Null => {}
            Value::String(field) => spec.push_field(field)?,
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(field) => spec.push_field(field)?,
                        Value::Object(members) => {
                            for (path, direction) in members {
                                spec.push(path, parse_direction(path, direction)?)?;
                            }
                        }
                        other => {
                            return Err(CoreError::invalid_sort(format!(
                                "sort entries must be strings or objects, found {}",
                                other.type_name()
                            )))
                        }
                    }
                }
            }
            Value::Object(members) => {
                for (path, direction) in members {
                    spec.push(path, parse_direction(path, direction)?)?;
                }
            }
            other => {
                return Err(CoreError::invalid_sort(format!(
                    "sort must be an array, found {}",
                    other.type_name()
                )))
            }
        }
        Ok(spec)
    }

    fn push_field(&mut self, field: &str) -> CoreResult<()> {
        match field.strip_prefix('-') {
            Some(path) => self.push(path, Direction::Descending),
            None => self.push(field, Direction::Ascending),
        }
    }

    fn push(&mut self, path: &str, direction: Direction) -> CoreResult<()> {
        if path.is_empty() || path.starts_with('$') {
            return Err(CoreError::invalid_sort(format!(
                "invalid field path {path:?}"
            )));
        }
        self.keys.push(SortKey {
            path: path.to_string(),
            direction,
        });
        Ok(())
    }

    /// Returns true if documents come back in identifier order.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The keys, most significant first.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// The sort key values of one document. `None` marks a missing value.
    #[must_use]
    pub fn key_of(&self, document: &FlatDocument) -> Vec<Option<Scalar>> {
        self.keys
            .iter()
            .map(|key| document.first_at(&key.path).cloned())
            .collect()
    }

    /// Compares two documents' keys, then their identifiers.
    #[must_use]
    pub fn compare(
        &self,
        (left_id, left): (&DocumentId, &[Option<Scalar>]),
        (right_id, right): (&DocumentId, &[Option<Scalar>]),
    ) -> Ordering {
        self.keys
            .iter()
            .zip(left.iter().zip(right))
            .map(|(key, (l, r))| key.direction.apply(l.cmp(r)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| left_id.cmp(right_id))
    }

    /// Orders `(id, document)` pairs.
    pub fn sort(&self, documents: &mut [(DocumentId, Vec<Option<Scalar>>)]) {
        if self.is_empty() {
            documents.sort_by(|a, b| a.0.cmp(&b.0));
        } else {
            documents.sort_by(|a, b| self.compare((&a.0, &a.1), (&b.0, &b.1)));
        }
    }

    /// Canonical form: an array of `{"path": 1 | -1}`.
    #[must_use]
    pub fn canonical(&self) -> Value {
        Value::Array(
            self.keys
                .iter()
                .map(|key| {
                    let direction = match key.direction {
                        Direction::Ascending => 1,
                        Direction::Descending => -1,
                    };
                    std::iter::once((key.path.clone(), Value::from(direction))).collect::<Value>()
                })
                .collect(),
        )
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical().to_json_string())
    }
}

fn parse_direction(path: &str, direction: &Value) -> CoreResult<Direction> {
    match direction {
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Direction::Ascending),
        Value::Number(n) if n.as_i64() == Some(-1) => Ok(Direction::Descending),
        Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(Direction::Ascending),
        Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(Direction::Descending),
        other => Err(CoreError::invalid_sort(format!(
            "{path}: direction must be 1, -1, \"asc\" or \"desc\", found {}",
            other.to_json_string()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> CoreResult<SortSpec> {
        SortSpec::parse(&Value::from_json_str(json).unwrap())
    }

    fn sorted(spec: &SortSpec, docs: &[(i64, &str)]) -> Vec<i64> {
        let mut keyed: Vec<_> = docs
            .iter()
            .map(|(id, json)| {
                let id = DocumentId::from(*id);
                let flat = FlatDocument::new(&id, &Value::from_json_str(json).unwrap());
                (id, spec.key_of(&flat))
            })
            .collect();
        spec.sort(&mut keyed);
        keyed
            .into_iter()
            .map(|(id, _)| match id {
                DocumentId::Integer(n) => n,
                DocumentId::Text(_) => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn accepted_forms_agree() {
        let expected = SortSpec::none().descending("score").ascending("name");
        for form in [
            r#"["-score", "name"]"#,
            r#"[{"score": -1}, {"name": 1}]"#,
            r#"[{"score": "desc"}, "name"]"#,
            r#"{"score": "DESC", "name": "asc"}"#,
        ] {
            assert_eq!(spec(form).unwrap(), expected, "{form}");
        }
        assert_eq!(spec(r#""name""#).unwrap(), SortSpec::none().ascending("name"));
        assert!(spec("null").unwrap().is_empty());
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for bad in [
            "1",
            "[1]",
            r#"[{"a": 2}]"#,
            r#"[{"a": "up"}]"#,
            r#"["-"]"#,
            r#"[""]"#,
        ] {
            assert!(
                matches!(spec(bad), Err(CoreError::InvalidSort { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_values_rank_lowest_and_ties_use_ids() {
        let docs = [
            (4, r#"{"s": 1}"#),
            (3, r#"{}"#),
            (2, r#"{"s": null}"#),
            (1, r#"{"s": 1}"#),
            (5, r#"{"s": "a"}"#),
            (6, r#"{"s": true}"#),
        ];
        let asc = SortSpec::none().ascending("s");
        assert_eq!(sorted(&asc, &docs), [3, 2, 6, 1, 4, 5]);
        let desc = SortSpec::none().descending("s");
        assert_eq!(sorted(&desc, &docs), [5, 1, 4, 6, 2, 3]);
    }

    #[test]
    fn later_keys_break_earlier_ties() {
        let docs = [
            (1, r#"{"g": 1, "n": "b"}"#),
            (2, r#"{"g": 1, "n": "a"}"#),
            (3, r#"{"g": 0, "n": "z"}"#),
        ];
        let spec = SortSpec::none().ascending("g").ascending("n");
        assert_eq!(sorted(&spec, &docs), [3, 2, 1]);
        assert_eq!(sorted(&SortSpec::none(), &docs), [1, 2, 3]);
    }

    #[test]
    fn canonical_form() {
        let spec = spec(r#"["-score", {"name": "asc"}]"#).unwrap();
        assert_eq!(spec.to_string(), r#"[{"score":-1},{"name":1}]"#);
    }
}
