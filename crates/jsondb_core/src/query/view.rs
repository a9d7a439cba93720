//! Compiled views.

use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::query::filter::Filter;
use crate::query::plan::Plan;
use crate::query::sort::SortSpec;
use crate::store::StoreView;
use jsondb_codec::Value;
use std::collections::BTreeSet;

/// A compiled `(filter, sort)` pair bound to one collection.
///
/// A view is a query plan, not a result set: [`resolve`](Self::resolve)
/// re-reads the state it is given every time, so a cached view never goes
/// stale.
#[derive(Debug, Clone)]
pub struct View {
    collection: String,
    filter: Filter,
    sort: SortSpec,
    plan: Plan,
    signature: String,
}

impl View {
    /// Compiles a view.
    #[must_use]
    pub fn new(collection: &str, filter: Filter, sort: SortSpec) -> Self {
        let plan = Plan::compile(&filter);
        let signature = Self::signature(collection, &filter, &sort);
        Self {
            collection: collection.to_string(),
            filter,
            sort,
            plan,
            signature,
        }
    }

    /// Parses and compiles a view from filter and sort trees.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] or [`CoreError::InvalidSort`]
    /// for malformed trees.
    pub fn compile(collection: &str, filter: &Value, sort: &Value) -> CoreResult<Self> {
        Ok(Self::new(
            collection,
            Filter::parse(filter)?,
            SortSpec::parse(sort)?,
        ))
    }

    /// The cache key of a view: collection name plus the canonical forms
    /// of the filter and the sort.
    #[must_use]
    pub fn signature(collection: &str, filter: &Filter, sort: &SortSpec) -> String {
        Value::Array(vec![
            Value::from(collection),
            filter.canonical(),
            sort.canonical(),
        ])
        .to_json_string()
    }

    /// The collection this view reads.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The filter.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The sort.
    #[must_use]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    /// The access plan.
    #[must_use]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The cache key.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.signature
    }

    /// Matching identifiers in sort order.
    #[must_use]
    pub fn resolve(&self, view: &StoreView<'_>) -> Vec<DocumentId> {
        if self.plan.is_empty() {
            return Vec::new();
        }
        let mut keyed: Vec<_> = self
            .plan
            .candidates(view, &self.collection)
            .into_iter()
            .filter_map(|id| {
                let flat = view.flat(&self.collection, &id)?;
                self.filter
                    .matches(flat)
                    .then(|| (id, self.sort.key_of(flat)))
            })
            .collect();
        self.sort.sort(&mut keyed);
        keyed.into_iter().map(|(id, _)| id).collect()
    }

    /// Number of matching documents.
    #[must_use]
    pub fn count(&self, view: &StoreView<'_>) -> usize {
        if self.plan.is_empty() {
            return 0;
        }
        self.plan
            .candidates(view, &self.collection)
            .into_iter()
            .filter(|id| {
                view.flat(&self.collection, id)
                    .is_some_and(|flat| self.filter.matches(flat))
            })
            .count()
    }
}

/// The set of paths a path-restricted view may filter and sort on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    paths: BTreeSet<String>,
}

impl PathSet {
    /// Declares the allowed paths.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `path` was declared.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// The declared paths.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Checks that a filter and a sort only use declared paths.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] or [`CoreError::InvalidSort`]
    /// naming the first undeclared path.
    pub fn check(&self, filter: &Filter, sort: &SortSpec) -> CoreResult<()> {
        if let Some(field) = filter.fields().find(|f| !self.contains(f.path())) {
            return Err(CoreError::invalid_filter(format!(
                "path {} is not part of this view",
                field.path()
            )));
        }
        if let Some(key) = sort.keys().iter().find(|k| !self.contains(&k.path)) {
            return Err(CoreError::invalid_sort(format!(
                "path {} is not part of this view",
                key.path
            )));
        }
        Ok(())
    }
}
