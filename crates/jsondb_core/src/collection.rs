//! Collection handles.
//!
//! A [`Collection`] names one collection of a [`Database`] and offers the
//! document store operations plus query construction. Every write has two
//! forms: one that runs in its own write transaction and an `_in` form that
//! joins a caller's transaction. An error in the `_in` form aborts the
//! caller's transaction.

use crate::database::Database;
use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::path::{set_value_at, value_at};
use crate::query::{Filter, PathSet, Query, SortSpec};
use crate::transaction::WriteTransaction;
use jsondb_codec::Value;
use std::borrow::Cow;
use tracing::trace;

/// A named collection of documents.
#[derive(Debug, Clone)]
pub struct Collection<'db> {
    db: &'db Database,
    name: String,
}

impl<'db> Collection<'db> {
    pub(crate) fn new(db: &'db Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database this collection belongs to.
    #[must_use]
    pub fn database(&self) -> &'db Database {
        self.db
    }

    // ---- transaction plumbing ----

    /// Runs `f` in a fresh write transaction and commits it.
    fn write<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'db>) -> CoreResult<T>,
    {
        let result = self.db.write_txn().and_then(|mut txn| {
            let value = f(&mut txn)?;
            txn.commit()?;
            Ok(value)
        });
        self.db.observe(result)
    }

    /// Runs `f` inside the caller's transaction, aborting it on error.
    fn join<T, F>(&self, txn: &mut WriteTransaction<'_>, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> CoreResult<T>,
    {
        let result = f(txn);
        if result.is_err() && txn.is_active() {
            txn.rollback()?;
        }
        self.db.observe(result)
    }

    /// Checks the identifier carried by `document` against `id` and, when
    /// identifiers are managed, writes `id` into object documents.
    fn prepare<'v>(&self, id: &DocumentId, document: &'v Value) -> CoreResult<Cow<'v, Value>> {
        let config = self.db.config();
        let Some(path) = config.identifier_path.as_deref() else {
            return Ok(Cow::Borrowed(document));
        };
        match value_at(document, path) {
            Some(carried) => {
                if DocumentId::from_value(carried)? != *id {
                    return Err(CoreError::write_conflict(
                        &self.name,
                        id,
                        format!("document carries identifier {carried} at {path}"),
                    ));
                }
                Ok(Cow::Borrowed(document))
            }
            None if config.manage_identifier && document.as_object().is_some() => {
                let mut managed = document.clone();
                set_value_at(&mut managed, path, id.to_value())?;
                Ok(Cow::Owned(managed))
            }
            None => Ok(Cow::Borrowed(document)),
        }
    }

    fn put_unchecked(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: DocumentId,
        document: &Value,
    ) -> CoreResult<()> {
        let document = self.prepare(&id, document)?;
        trace!(collection = %self.name, %id, "put");
        txn.put(&self.name, id, &document)
    }

    /// The identifier `save` would use for `document`.
    fn identify(&self, document: &Value) -> CoreResult<DocumentId> {
        let carried = self
            .db
            .config()
            .identifier_path
            .as_deref()
            .and_then(|path| value_at(document, path));
        match carried {
            Some(value) => DocumentId::from_value(value),
            None => Ok((self.db.identifier_factory())(self.name.as_str())),
        }
    }

    // ---- store operations ----

    /// Stores `document` under `id`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteConflict`] if the document carries a
    /// different identifier at the identifier path.
    pub fn put(&self, id: impl Into<DocumentId>, document: &Value) -> CoreResult<()> {
        let id = id.into();
        self.write(|txn| self.put_unchecked(txn, id, document))
    }

    /// [`put`](Self::put) inside `txn`.
    pub fn put_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: impl Into<DocumentId>,
        document: &Value,
    ) -> CoreResult<()> {
        let id = id.into();
        self.join(txn, |txn| self.put_unchecked(txn, id, document))
    }

    fn insert_unchecked(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: DocumentId,
        document: &Value,
    ) -> CoreResult<()> {
        if txn.contains(&self.name, &id) {
            return Err(CoreError::write_conflict(
                &self.name,
                &id,
                "document already exists",
            ));
        }
        self.put_unchecked(txn, id, document)
    }

    /// Stores `document` under `id`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteConflict`] if `id` is taken.
    pub fn insert(&self, id: impl Into<DocumentId>, document: &Value) -> CoreResult<()> {
        let id = id.into();
        self.write(|txn| self.insert_unchecked(txn, id, document))
    }

    /// [`insert`](Self::insert) inside `txn`.
    pub fn insert_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: impl Into<DocumentId>,
        document: &Value,
    ) -> CoreResult<()> {
        let id = id.into();
        self.join(txn, |txn| self.insert_unchecked(txn, id, document))
    }

    fn save_unchecked(
        &self,
        txn: &mut WriteTransaction<'_>,
        document: &Value,
    ) -> CoreResult<DocumentId> {
        let id = self.identify(document)?;
        self.put_unchecked(txn, id.clone(), document)?;
        Ok(id)
    }

    /// Stores `document` and returns its identifier.
    ///
    /// The identifier is the value at the configured identifier path, or a
    /// fresh one from the identifier factory.
    pub fn save(&self, document: &Value) -> CoreResult<DocumentId> {
        self.write(|txn| self.save_unchecked(txn, document))
    }

    /// [`save`](Self::save) inside `txn`.
    pub fn save_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        document: &Value,
    ) -> CoreResult<DocumentId> {
        self.join(txn, |txn| self.save_unchecked(txn, document))
    }

    fn replace_unchecked(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: DocumentId,
        document: &Value,
    ) -> CoreResult<()> {
        if !txn.contains(&self.name, &id) {
            return Err(CoreError::not_found(&self.name, &id));
        }
        self.put_unchecked(txn, id, document)
    }

    /// Replaces the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if there is none.
    pub fn replace(&self, id: impl Into<DocumentId>, document: &Value) -> CoreResult<()> {
        let id = id.into();
        self.write(|txn| self.replace_unchecked(txn, id, document))
    }

    /// [`replace`](Self::replace) inside `txn`.
    pub fn replace_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: impl Into<DocumentId>,
        document: &Value,
    ) -> CoreResult<()> {
        let id = id.into();
        self.join(txn, |txn| self.replace_unchecked(txn, id, document))
    }

    /// Fetches one document.
    pub fn get(&self, id: impl Into<DocumentId>) -> CoreResult<Option<Value>> {
        let id = id.into();
        let result = self
            .db
            .read_txn()
            .and_then(|txn| txn.get(&self.name, &id));
        self.db.observe(result)
    }

    /// [`get`](Self::get) inside `txn`, seeing its pending writes.
    pub fn get_in(
        &self,
        txn: &WriteTransaction<'_>,
        id: impl Into<DocumentId>,
    ) -> CoreResult<Option<Value>> {
        let result = txn.get(&self.name, &id.into());
        self.db.observe(result)
    }

    /// Removes one document. Returns true if it existed.
    pub fn remove(&self, id: impl Into<DocumentId>) -> CoreResult<bool> {
        let id = id.into();
        self.write(|txn| txn.remove(&self.name, &id))
    }

    /// [`remove`](Self::remove) inside `txn`.
    pub fn remove_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        id: impl Into<DocumentId>,
    ) -> CoreResult<bool> {
        let id = id.into();
        self.join(txn, |txn| txn.remove(&self.name, &id))
    }

    /// Number of documents.
    pub fn len(&self) -> CoreResult<usize> {
        let result = self.db.read_txn().map(|txn| txn.view().len(&self.name));
        self.db.observe(result)
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every identifier, ascending.
    pub fn ids(&self) -> CoreResult<Vec<DocumentId>> {
        let result = self
            .db
            .read_txn()
            .map(|txn| txn.view().ids(&self.name).into_iter().collect());
        self.db.observe(result)
    }

    // ---- queries ----

    /// Builds a query from a filter tree, in identifier order.
    ///
    /// ```
    /// use jsondb_core::{Database, Value};
    ///
    /// let db = Database::open_in_memory().unwrap();
    /// let players = db.collection("players").unwrap();
    /// players.put("ann", &Value::from_json_str(r#"{"score": 10}"#).unwrap()).unwrap();
    /// players.put("bob", &Value::from_json_str(r#"{"score": 7}"#).unwrap()).unwrap();
    ///
    /// let query = players
    ///     .find(&Value::from_json_str(r#"{"score": {"$gt": 8}}"#).unwrap())
    ///     .unwrap();
    /// assert_eq!(query.count().unwrap(), 1);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] for a malformed filter.
    pub fn find(&self, filter: &Value) -> CoreResult<Query<'db>> {
        self.find_sorted(filter, &Value::Null)
    }

    /// Builds a query from a filter tree and a sort specification.
    pub fn find_sorted(&self, filter: &Value, sort: &Value) -> CoreResult<Query<'db>> {
        let result = Filter::parse(filter)
            .and_then(|filter| Ok((filter, SortSpec::parse(sort)?)))
            .and_then(|(filter, sort)| self.compile(filter, sort));
        self.db.observe(result)
    }

    /// Builds a query from already parsed parts.
    pub fn query(&self, filter: Filter, sort: SortSpec) -> CoreResult<Query<'db>> {
        let result = self.compile(filter, sort);
        self.db.observe(result)
    }

    /// A query over every document in identifier order.
    pub fn all(&self) -> CoreResult<Query<'db>> {
        self.query(Filter::all(), SortSpec::none())
    }

    fn compile(&self, filter: Filter, sort: SortSpec) -> CoreResult<Query<'db>> {
        let view = self.db.view(&self.name, filter, sort)?;
        Ok(Query::new(self.db, view))
    }

    /// Declares a view restricted to `paths`. Queries built from it may
    /// only filter and sort on those paths.
    pub fn view_for_paths<I, S>(&self, paths: I) -> PathView<'db>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PathView {
            collection: self.clone(),
            paths: PathSet::new(paths),
        }
    }
}

/// A collection restricted to a fixed set of queryable paths.
#[derive(Debug, Clone)]
pub struct PathView<'db> {
    collection: Collection<'db>,
    paths: PathSet,
}

impl<'db> PathView<'db> {
    /// The underlying collection.
    #[must_use]
    pub fn collection(&self) -> &Collection<'db> {
        &self.collection
    }

    /// The declared paths.
    #[must_use]
    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// [`Collection::find`] limited to the declared paths.
    pub fn find(&self, filter: &Value) -> CoreResult<Query<'db>> {
        self.find_sorted(filter, &Value::Null)
    }

    /// [`Collection::find_sorted`] limited to the declared paths.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFilter`] or [`CoreError::InvalidSort`]
    /// when an undeclared path is used.
    pub fn find_sorted(&self, filter: &Value, sort: &Value) -> CoreResult<Query<'db>> {
        let result = Filter::parse(filter)
            .and_then(|filter| Ok((filter, SortSpec::parse(sort)?)))
            .and_then(|(filter, sort)| self.query_unobserved(filter, sort));
        self.collection.db.observe(result)
    }

    /// [`Collection::query`] limited to the declared paths.
    pub fn query(&self, filter: Filter, sort: SortSpec) -> CoreResult<Query<'db>> {
        let result = self.query_unobserved(filter, sort);
        self.collection.db.observe(result)
    }

    fn query_unobserved(&self, filter: Filter, sort: SortSpec) -> CoreResult<Query<'db>> {
        self.paths.check(&filter, &sort)?;
        self.collection.compile(filter, sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn doc(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn save_writes_generated_identifier() {
        let db = Database::open_in_memory().unwrap();
        db.set_identifier_factory(Arc::new(|_| DocumentId::from(42)));
        let players = db.collection("players").unwrap();

        let id = players.save(&doc(r#"{"name": "Ann"}"#)).unwrap();
        assert_eq!(id, DocumentId::from(42));
        assert_eq!(
            players.get(42).unwrap(),
            Some(doc(r#"{"name": "Ann", "_id": 42}"#))
        );
    }

    #[test]
    fn save_uses_carried_identifier() {
        let db = Database::open_in_memory().unwrap();
        let players = db.collection("players").unwrap();
        let id = players.save(&doc(r#"{"_id": "ann", "score": 1}"#)).unwrap();
        assert_eq!(id, DocumentId::from("ann"));
        assert_eq!(players.len().unwrap(), 1);
    }

    #[test]
    fn unmanaged_identifiers_stay_out_of_documents() {
        let config = Config::default().manage_identifier(false);
        let db = Database::open_in_memory_with_config(config).unwrap();
        let players = db.collection("players").unwrap();
        let id = players.save(&doc(r#"{"name": "Bob"}"#)).unwrap();
        assert_eq!(players.get(id).unwrap(), Some(doc(r#"{"name": "Bob"}"#)));
    }

    #[test]
    fn put_rejects_mismatched_identifier() {
        let db = Database::open_in_memory().unwrap();
        let players = db.collection("players").unwrap();
        let result = players.put("bob", &doc(r#"{"_id": "ann"}"#));
        assert!(matches!(result, Err(CoreError::WriteConflict { .. })));
        assert!(players.is_empty().unwrap());
    }

    #[test]
    fn insert_and_replace_check_existence() {
        let db = Database::open_in_memory().unwrap();
        let c = db.collection("c").unwrap();
        assert!(matches!(
            c.replace(1, &doc("{}")),
            Err(CoreError::NotFound { .. })
        ));
        c.insert(1, &doc("{}")).unwrap();
        assert!(matches!(
            c.insert(1, &doc("{}")),
            Err(CoreError::WriteConflict { .. })
        ));
        c.replace(1, &doc(r#"{"v": 2}"#)).unwrap();
        assert_eq!(c.get(1).unwrap(), Some(doc(r#"{"v": 2, "_id": 1}"#)));
    }

    #[test]
    fn remove_reports_existence() {
        let db = Database::open_in_memory().unwrap();
        let c = db.collection("c").unwrap();
        c.put("k", &doc("{}")).unwrap();
        assert!(c.remove("k").unwrap());
        assert!(!c.remove("k").unwrap());
        assert!(c.ids().unwrap().is_empty());
    }

    #[test]
    fn failed_join_aborts_the_shared_transaction() {
        let db = Database::open_in_memory().unwrap();
        let c = db.collection("c").unwrap();
        c.put(1, &doc("{}")).unwrap();

        let mut txn = db.begin_write().unwrap();
        c.put_in(&mut txn, 2, &doc("{}")).unwrap();
        assert!(c.insert_in(&mut txn, 1, &doc("{}")).is_err());
        assert!(!txn.is_active());
        assert!(txn.commit().is_err());
        assert_eq!(c.ids().unwrap(), vec![DocumentId::from(1)]);
    }

    #[test]
    fn path_views_reject_undeclared_paths() {
        let db = Database::open_in_memory().unwrap();
        let c = db.collection("c").unwrap();
        let view = c.view_for_paths(["name", "score"]);
        assert!(view.find(&doc(r#"{"name": "Ann"}"#)).is_ok());
        assert!(matches!(
            view.find(&doc(r#"{"age": 3}"#)),
            Err(CoreError::InvalidFilter { .. })
        ));
        assert!(matches!(
            view.find_sorted(&Value::Null, &doc(r#"["-age"]"#)),
            Err(CoreError::InvalidSort { .. })
        ));
    }
}
