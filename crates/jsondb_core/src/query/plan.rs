//! Access plans.
//!
//! A plan picks, for each filtered path, the cheapest way to find a superset
//! of the matching documents in the `(path, type, scalar)` index, then seeds
//! the candidate set from the most selective path. Every candidate is
//! verified against the full filter afterwards, so a seek only has to be
//! complete, never exact.

use crate::document::DocumentId;
use crate::flatten::{Scalar, ScalarType};
use crate::query::filter::{Constraint, FieldFilter, Filter};
use crate::store::StoreView;
use std::collections::BTreeSet;
use std::ops::Bound;

/// How candidates for one path are found.
#[derive(Debug, Clone, PartialEq)]
pub enum Seek {
    /// The constraints contradict each other; nothing can match.
    Empty,
    /// Equality against one or more values.
    Points(Vec<Scalar>),
    /// A range within one type.
    Range {
        /// Lower bound.
        lower: Bound<Scalar>,
        /// Upper bound.
        upper: Bound<Scalar>,
    },
    /// Every document with a value at the path.
    Path,
}

impl Seek {
    /// Lower is cheaper.
    fn cost(&self) -> (u8, usize) {
        match self {
            Self::Empty => (0, 0),
            Self::Points(points) => (1, points.len()),
            Self::Range { .. } => (2, 0),
            Self::Path => (3, 0),
        }
    }

    /// Derives the seek for one field's constraints.
    #[must_use]
    pub fn for_field(field: &FieldFilter) -> Self {
        let mut points: Option<Vec<Scalar>> = None;
        let mut range = TypedRange::default();

        for constraint in field.constraints() {
            match constraint {
                Constraint::Eq(value) => {
                    points = Some(intersect(points, std::slice::from_ref(value)));
                }
                Constraint::In(members) => points = Some(intersect(points, members)),
                Constraint::Gt(value) => range.raise(Bound::Excluded(value.clone())),
                Constraint::Gte(value) => range.raise(Bound::Included(value.clone())),
                Constraint::Lt(value) => range.lower_upper(Bound::Excluded(value.clone())),
                Constraint::Lte(value) => range.lower_upper(Bound::Included(value.clone())),
                Constraint::Like(pattern) => {
                    let prefix = pattern.prefix();
                    range.raise(Bound::Included(Scalar::String(prefix.clone())));
                    if let Some(end) = prefix_successor(&prefix) {
                        range.lower_upper(Bound::Excluded(Scalar::String(end)));
                    } else {
                        range.restrict_type(ScalarType::String);
                    }
                }
                Constraint::Ne(_) => {}
            }
        }

        match points {
            Some(points) if points.is_empty() => Self::Empty,
            Some(points) => Self::Points(points),
            None if range.conflict => Self::Empty,
            None => match range.scalar_type {
                Some(scalar_type) => {
                    let lower = range
                        .lower
                        .unwrap_or_else(|| Bound::Included(scalar_type.min_value()));
                    let upper = range.upper.unwrap_or_else(|| {
                        scalar_type
                            .max_value()
                            .map_or(Bound::Unbounded, Bound::Included)
                    });
                    Self::Range { lower, upper }
                }
                None => Self::Path,
            },
        }
    }

    /// Runs the seek.
    fn execute(&self, view: &StoreView<'_>, collection: &str, path: &str) -> BTreeSet<DocumentId> {
        match self {
            Self::Empty => BTreeSet::new(),
            Self::Points(points) => view.seek_points(collection, path, points),
            Self::Range { lower, upper } => {
                view.seek_range(collection, path, lower.as_ref(), upper.as_ref())
            }
            Self::Path => view.seek_path(collection, path),
        }
    }
}

/// Bounds collected from comparison operators, all of one type.
#[derive(Debug, Default)]
struct TypedRange {
    scalar_type: Option<ScalarType>,
    lower: Option<Bound<Scalar>>,
    upper: Option<Bound<Scalar>>,
    conflict: bool,
}

impl TypedRange {
    fn restrict_type(&mut self, scalar_type: ScalarType) {
        match self.scalar_type {
            Some(existing) if existing != scalar_type => self.conflict = true,
            _ => self.scalar_type = Some(scalar_type),
        }
    }

    fn raise(&mut self, bound: Bound<Scalar>) {
        if let Some(scalar) = bound_value(&bound) {
            self.restrict_type(scalar.scalar_type());
        }
        let tighter = match &self.lower {
            None => true,
            Some(current) => lower_is_tighter(&bound, current),
        };
        if tighter {
            self.lower = Some(bound);
        }
    }

    fn lower_upper(&mut self, bound: Bound<Scalar>) {
        if let Some(scalar) = bound_value(&bound) {
            self.restrict_type(scalar.scalar_type());
        }
        let tighter = match &self.upper {
            None => true,
            Some(current) => upper_is_tighter(&bound, current),
        };
        if tighter {
            self.upper = Some(bound);
        }
    }
}

fn bound_value(bound: &Bound<Scalar>) -> Option<&Scalar> {
    match bound {
        Bound::Included(s) | Bound::Excluded(s) => Some(s),
        Bound::Unbounded => None,
    }
}

fn lower_is_tighter(candidate: &Bound<Scalar>, current: &Bound<Scalar>) -> bool {
    match (bound_value(candidate), bound_value(current)) {
        (Some(a), Some(b)) => a > b || (a == b && matches!(candidate, Bound::Excluded(_))),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn upper_is_tighter(candidate: &Bound<Scalar>, current: &Bound<Scalar>) -> bool {
    match (bound_value(candidate), bound_value(current)) {
        (Some(a), Some(b)) => a < b || (a == b && matches!(candidate, Bound::Excluded(_))),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Members of `current` (all values when `None`) also in `members`.
fn intersect(current: Option<Vec<Scalar>>, members: &[Scalar]) -> Vec<Scalar> {
    let mut members = members.to_vec();
    members.sort();
    members.dedup();
    match current {
        None => members,
        Some(current) => current
            .into_iter()
            .filter(|value| members.binary_search(value).is_ok())
            .collect(),
    }
}

/// The smallest string greater than every string starting with `prefix`,
/// or `None` if there is none.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = (u32::from(last) + 1..=u32::from(char::MAX)).find_map(char::from_u32);
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

/// A compiled access plan for one filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    seeks: Vec<(String, Seek)>,
}

impl Plan {
    /// Compiles the plan for `filter`.
    #[must_use]
    pub fn compile(filter: &Filter) -> Self {
        let seeks = filter
            .fields()
            .map(|field| (field.path().to_string(), Seek::for_field(field)))
            .collect();
        Self { seeks }
    }

    /// Per-path seeks in path order.
    #[must_use]
    pub fn seeks(&self) -> &[(String, Seek)] {
        &self.seeks
    }

    /// Returns true if no document can match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeks.iter().any(|(_, seek)| *seek == Seek::Empty)
    }

    /// The path seeded from, if any.
    #[must_use]
    pub fn driving_seek(&self) -> Option<(&str, &Seek)> {
        self.seeks
            .iter()
            .min_by_key(|(_, seek)| seek.cost())
            .map(|(path, seek)| (path.as_str(), seek))
    }

    /// Candidate identifiers: a superset of the matching documents.
    #[must_use]
    pub fn candidates(&self, view: &StoreView<'_>, collection: &str) -> BTreeSet<DocumentId> {
        match self.driving_seek() {
            Some((path, seek)) => seek.execute(view, collection, path),
            None => view.ids(collection),
        }
    }
}
