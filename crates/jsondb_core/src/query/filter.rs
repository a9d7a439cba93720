//! Filter trees.
//!
//! A filter is an object mapping field paths to either a literal scalar
//! (implicit `$eq`) or an operator object:
//!
//! ```text
//! { "name": "Ann", "score": { "$gt": 10, "$lte": 20 }, "tags": { "$in": ["a", "b"] } }
//! ```
//!
//! Every constraint on one path must be satisfied by the same value at that
//! path, and every path must match (logical AND). A document with no value
//! at a path fails every constraint on it, including `$ne`.

use crate::error::{CoreError, CoreResult};
use crate::flatten::{FlatDocument, Scalar};
use jsondb_codec::{Object, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A `$like` pattern: `%` matches any run of characters, `_` matches one.
/// Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LikePattern {
    source: String,
    tokens: Vec<LikeToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LikeToken {
    Char(char),
    One,
    Any,
}

impl LikePattern {
    /// Compiles a pattern.
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let tokens = pattern
            .chars()
            .map(|c| match c {
                '%' => LikeToken::Any,
                '_' => LikeToken::One,
                c => LikeToken::Char(c),
            })
            .collect();
        Self {
            source: pattern.to_string(),
            tokens,
        }
    }

    /// The pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The literal text before the first wildcard.
    #[must_use]
    pub fn prefix(&self) -> String {
        self.tokens
            .iter()
            .map_while(|token| match token {
                LikeToken::Char(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Tests `text` against the pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let (mut p, mut t) = (0, 0);
        // Last `%` seen and the text position it currently covers up to.
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match self.tokens.get(p) {
                Some(LikeToken::Char(c)) if *c == text[t] => {
                    p += 1;
                    t += 1;
                }
                Some(LikeToken::One) => {
                    p += 1;
                    t += 1;
                }
                Some(LikeToken::Any) => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                _ => match backtrack {
                    Some((star, covered)) => {
                        p = star + 1;
                        t = covered + 1;
                        backtrack = Some((star, covered + 1));
                    }
                    None => return false,
                },
            }
        }
        self.tokens[p..]
            .iter()
            .all(|token| *token == LikeToken::Any)
    }
}

/// One operator constraint on a field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Constraint {
    /// `$eq`: same type and value.
    Eq(Scalar),
    /// `$ne`: not `$eq`.
    Ne(Scalar),
    /// `$gt`, within one type.
    Gt(Scalar),
    /// `$gte` (alias `$ge`), within one type.
    Gte(Scalar),
    /// `$lt`, within one type.
    Lt(Scalar),
    /// `$lte` (alias `$le`), within one type.
    Lte(Scalar),
    /// `$like`, strings only.
    Like(LikePattern),
    /// `$in`: `$eq` against any member. Members are sorted and unique.
    In(Vec<Scalar>),
}

impl Constraint {
    /// Parses `operator: operand` for the field at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] for unknown operators and
    /// operands of the wrong shape.
    pub fn parse(path: &str, operator: &str, operand: &Value) -> CoreResult<Self> {
        let scalar = || operand_scalar(path, operator, operand);
        Ok(match operator {
            "$eq" => Self::Eq(scalar()?),
            "$ne" => Self::Ne(scalar()?),
            "$gt" => Self::Gt(scalar()?),
            "$gte" | "$ge" => Self::Gte(scalar()?),
            "$lt" => Self::Lt(scalar()?),
            "$lte" | "$le" => Self::Lte(scalar()?),
            "$like" => match operand {
                Value::String(pattern) => Self::Like(LikePattern::new(pattern)),
                other => {
                    return Err(CoreError::invalid_filter(format!(
                        "{path}: $like needs a string pattern, found {}",
                        other.type_name()
                    )))
                }
            },
            "$in" => {
                let Value::Array(items) = operand else {
                    return Err(CoreError::invalid_filter(format!(
                        "{path}: $in needs an array, found {}",
                        operand.type_name()
                    )));
                };
                let mut members = items
                    .iter()
                    .map(|item| operand_scalar(path, "$in", item))
                    .collect::<CoreResult<Vec<_>>>()?;
                members.sort();
                members.dedup();
                Self::In(members)
            }
            other => {
                return Err(CoreError::invalid_filter(format!(
                    "{path}: unknown operator {other}"
                )))
            }
        })
    }

    /// Canonical operator name.
    #[must_use]
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Eq(_) => "$eq",
            Self::Ne(_) => "$ne",
            Self::Gt(_) => "$gt",
            Self::Gte(_) => "$gte",
            Self::Lt(_) => "$lt",
            Self::Lte(_) => "$lte",
            Self::Like(_) => "$like",
            Self::In(_) => "$in",
        }
    }

    /// The operand as a document value.
    #[must_use]
    pub fn operand(&self) -> Value {
        match self {
            Self::Eq(s) | Self::Ne(s) | Self::Gt(s) | Self::Gte(s) | Self::Lt(s) | Self::Lte(s) => {
                s.to_value()
            }
            Self::Like(pattern) => Value::from(pattern.as_str()),
            Self::In(members) => Value::Array(members.iter().map(Scalar::to_value).collect()),
        }
    }

    /// Tests one value.
    #[must_use]
    pub fn matches(&self, value: &Scalar) -> bool {
        let same_type = |target: &Scalar| value.scalar_type() == target.scalar_type();
        match self {
            Self::Eq(target) => value == target,
            Self::Ne(target) => value != target,
            Self::Gt(target) => same_type(target) && value > target,
            Self::Gte(target) => same_type(target) && value >= target,
            Self::Lt(target) => same_type(target) && value < target,
            Self::Lte(target) => same_type(target) && value <= target,
            Self::Like(pattern) => value.as_str().is_some_and(|text| pattern.matches(text)),
            Self::In(members) => members.binary_search(value).is_ok(),
        }
    }
}

/// Constraints on one field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    path: String,
    constraints: Vec<Constraint>,
}

impl FieldFilter {
    /// The field path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The constraints, in canonical order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Tests a single value against every constraint.
    #[must_use]
    pub fn matches_value(&self, value: &Scalar) -> bool {
        self.constraints.iter().all(|c| c.matches(value))
    }

    /// Tests a document: some value at the path must satisfy every
    /// constraint.
    #[must_use]
    pub fn matches(&self, document: &FlatDocument) -> bool {
        document
            .values_at(&self.path)
            .iter()
            .any(|value| self.matches_value(value))
    }
}

/// A parsed filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    fields: BTreeMap<String, FieldFilter>,
}

impl Filter {
    /// A filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Starts building a filter.
    #[must_use]
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    /// Parses a filter tree. `null` matches every document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] if the tree is malformed.
    pub fn parse(filter: &Value) -> CoreResult<Self> {
        let members = match filter {
            Value::Null => return Ok(Self::default()),
            Value::Object(members) => members,
            other => {
                return Err(CoreError::invalid_filter(format!(
                    "filter must be an object, found {}",
                    other.type_name()
                )))
            }
        };

        let mut fields = BTreeMap::new();
        for (path, spec) in members {
            if path.is_empty() || path.starts_with('$') {
                return Err(CoreError::invalid_filter(format!(
                    "invalid field path {path:?}"
                )));
            }
            let mut constraints = match spec {
                Value::Object(operators) => parse_operators(path, operators)?,
                Value::Array(_) => {
                    return Err(CoreError::invalid_filter(format!(
                        "{path}: array literals cannot be matched, use $in"
                    )))
                }
                literal => vec![Constraint::parse(path, "$eq", literal)?],
            };
            constraints.sort();
            constraints.dedup();
            fields.insert(
                path.clone(),
                FieldFilter {
                    path: path.clone(),
                    constraints,
                },
            );
        }
        Ok(Self { fields })
    }

    /// Returns true if the filter matches every document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Per-field constraints in path order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldFilter> {
        self.fields.values()
    }

    /// Constraints on one path.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&FieldFilter> {
        self.fields.get(path)
    }

    /// Tests a document's flat entries.
    #[must_use]
    pub fn matches(&self, document: &FlatDocument) -> bool {
        self.fields.values().all(|field| field.matches(document))
    }

    /// Canonical form: paths sorted, each mapped to its sorted
    /// `[operator, operand]` pairs. Equivalent filters share one form.
    #[must_use]
    pub fn canonical(&self) -> Value {
        self.fields
            .iter()
            .map(|(path, field)| {
                let pairs = field
                    .constraints
                    .iter()
                    .map(|c| Value::Array(vec![Value::from(c.operator()), c.operand()]))
                    .collect();
                (path.clone(), Value::Array(pairs))
            })
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical().to_json_string())
    }
}

/// The scalar operand of `operator`. Non-finite numbers are rejected, as
/// they can never be stored.
fn operand_scalar(path: &str, operator: &str, operand: &Value) -> CoreResult<Scalar> {
    match Scalar::from_value(operand) {
        Some(Scalar::Number(n)) if !n.is_finite() => Err(CoreError::invalid_filter(format!(
            "{path}: {operator} operand {} is not a finite number",
            n.as_f64()
        ))),
        Some(scalar) => Ok(scalar),
        None => Err(CoreError::invalid_filter(format!(
            "{path}: {operator} needs scalar operands, found {}",
            operand.type_name()
        ))),
    }
}

fn parse_operators(path: &str, operators: &Object) -> CoreResult<Vec<Constraint>> {
    if operators.is_empty() {
        return Err(CoreError::invalid_filter(format!(
            "{path}: empty operator object"
        )));
    }
    operators
        .iter()
        .map(|(operator, operand)| {
            if operator.starts_with('$') {
                Constraint::parse(path, operator, operand)
            } else {
                Err(CoreError::invalid_filter(format!(
                    "{path}: object literals cannot be matched, use a dotted path for {operator:?}"
                )))
            }
        })
        .collect()
}

/// Builds a filter tree operator by operator.
///
/// ```
/// use jsondb_core::Filter;
///
/// let filter = Filter::builder()
///     .eq("isActive", false)
///     .like("name", "Mari%")
///     .gte("age", 40)
///     .build()
///     .unwrap();
/// assert_eq!(filter.fields().count(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    fields: Object,
}

impl FilterBuilder {
    fn operator(mut self, path: &str, operator: &str, operand: Value) -> Self {
        let entry = self
            .fields
            .entry(path.to_string())
            .or_insert_with(Value::object);
        if let Value::Object(operators) = entry {
            operators.insert(operator.to_string(), operand);
        }
        self
    }

    /// Adds `$eq`.
    #[must_use]
    pub fn eq(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$eq", value.into())
    }

    /// Adds `$ne`.
    #[must_use]
    pub fn ne(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$ne", value.into())
    }

    /// Adds `$gt`.
    #[must_use]
    pub fn gt(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$gt", value.into())
    }

    /// Adds `$gte`.
    #[must_use]
    pub fn gte(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$gte", value.into())
    }

    /// Adds `$lt`.
    #[must_use]
    pub fn lt(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$lt", value.into())
    }

    /// Adds `$lte`.
    #[must_use]
    pub fn lte(self, path: &str, value: impl Into<Value>) -> Self {
        self.operator(path, "$lte", value.into())
    }

    /// Adds `$like`.
    #[must_use]
    pub fn like(self, path: &str, pattern: &str) -> Self {
        self.operator(path, "$like", Value::from(pattern))
    }

    /// Adds `$in`.
    #[must_use]
    pub fn is_in<I, V>(self, path: &str, members: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.operator(path, "$in", Value::Array(members))
    }

    /// The filter tree built so far.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Parses the tree built so far.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] if an operand has the wrong
    /// shape.
    pub fn build(self) -> CoreResult<Filter> {
        Filter::parse(&self.into_value())
    }
}
