//! Query execution, including atomic find-and-modify.
//!
//! Read operations run in a read transaction over one committed snapshot.
//! Modify and remove operations run in exactly one write transaction:
//!
//! 1. resolve the view and cut the requested window
//! 2. for each identifier, in order:
//!    - load the document
//!    - ask the callback for a [`ModifyOutcome`] (pure removals use
//!      `REMOVE`)
//!    - `ROLLBACK` aborts the transaction and the call fails with
//!      [`CoreError::CallbackAbort`]; otherwise `UPDATE` stores the
//!      callback's version and `REMOVE` deletes the document
//!    - `RETURN_OLD` contributes the document as loaded, `RETURN_NEW` the
//!      document as stored after the outcome (removed documents contribute
//!      nothing new)
//!    - `STOP` ends the loop
//! 3. commit
//!
//! Any error inside a modify aborts its transaction, including a caller
//! supplied one.

use crate::database::Database;
use crate::document::DocumentId;
use crate::error::{CoreError, CoreResult};
use crate::path::value_at;
use crate::query::outcome::ModifyOutcome;
use crate::query::view::View;
use crate::store::StoreView;
use crate::transaction::WriteTransaction;
use jsondb_codec::Value;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The slice of the resolved sequence an operation visits.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Window {
    All,
    Range(Range<usize>),
}

impl Window {
    const FIRST: Self = Self::Range(0..1);

    fn apply(&self, ids: Vec<DocumentId>) -> Vec<DocumentId> {
        match self {
            Self::All => ids,
            Self::Range(range) => ids
                .into_iter()
                .skip(range.start)
                .take(range.end.saturating_sub(range.start))
                .collect(),
        }
    }
}

/// A modify callback.
type Callback<'f> = &'f mut dyn FnMut(&mut Value) -> ModifyOutcome;

#[derive(Debug, Default)]
struct Modified {
    documents: Vec<Value>,
    updated: usize,
    removed: usize,
}

/// A query over one collection: a cached [`View`] plus the operations that
/// execute it.
#[derive(Debug, Clone)]
pub struct Query<'db> {
    db: &'db Database,
    view: Arc<View>,
}

impl<'db> Query<'db> {
    pub(crate) fn new(db: &'db Database, view: Arc<View>) -> Self {
        Self { db, view }
    }

    /// The compiled view.
    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    fn log(&self, operation: &str, documents: usize) {
        let collection = self.view.collection();
        if self.db.config().verbose {
            debug!(
                operation,
                collection,
                documents,
                view = self.view.cache_key(),
                "query executed"
            );
        } else {
            trace!(
                operation,
                collection,
                documents,
                view = self.view.cache_key(),
                "query executed"
            );
        }
    }

    // ---- reads ----

    /// Number of matching documents.
    ///
    /// Counting reads the path index only, so a stored document that fails
    /// to decode is still counted whenever its (empty) entries match, while
    /// [`all`](Self::all) skips it. With `strict_reads` the two never
    /// disagree silently: `all` fails instead.
    pub fn count(&self) -> CoreResult<usize> {
        let result = self.db.read_txn().map(|txn| {
            let count = self.view.count(&txn.view());
            self.log("count", count);
            count
        });
        self.db.observe(result)
    }

    /// Matching identifiers in order. Like [`count`](Self::count), this
    /// includes documents that fail to decode.
    pub fn ids(&self) -> CoreResult<Vec<DocumentId>> {
        let result = self
            .db
            .read_txn()
            .map(|txn| self.view.resolve(&txn.view()));
        self.db.observe(result)
    }

    fn read(&self, operation: &str, window: &Window) -> CoreResult<Vec<Value>> {
        let result = self.db.read_txn().and_then(|txn| {
            let store = txn.view();
            let ids = window.apply(self.view.resolve(&store));
            let documents = self.load(&store, ids)?;
            self.log(operation, documents.len());
            Ok(documents)
        });
        self.db.observe(result)
    }

    /// Decodes documents. Undecodable ones are skipped and reported unless
    /// reads are strict.
    fn load(&self, store: &StoreView<'_>, ids: Vec<DocumentId>) -> CoreResult<Vec<Value>> {
        let collection = self.view.collection();
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            match store.get(collection, &id) {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {}
                Err(error) if !self.db.config().strict_reads => {
                    warn!(collection, %id, %error, "skipping undecodable document");
                    self.db.report(&error);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(documents)
    }

    /// Every matching document, in order.
    pub fn all(&self) -> CoreResult<Vec<Value>> {
        self.read("all", &Window::All)
    }

    /// Every matching document, mapped through `project`.
    pub fn all_and_project<T, F>(&self, project: F) -> CoreResult<Vec<T>>
    where
        F: FnMut(&Value) -> T,
    {
        Ok(self.all()?.iter().map(project).collect())
    }

    /// Every matching document, reduced to the values at `paths`.
    pub fn all_and_project_paths(&self, paths: &[&str]) -> CoreResult<Vec<Value>> {
        self.all_and_project(|document| project_paths(document, paths))
    }

    /// The matching documents at positions `range`.
    pub fn all_in_range(&self, range: Range<usize>) -> CoreResult<Vec<Value>> {
        self.read("all_in_range", &Window::Range(range))
    }

    /// The matching documents at positions `range`, mapped through
    /// `project`.
    pub fn all_in_range_and_project<T, F>(
        &self,
        range: Range<usize>,
        project: F,
    ) -> CoreResult<Vec<T>>
    where
        F: FnMut(&Value) -> T,
    {
        Ok(self.all_in_range(range)?.iter().map(project).collect())
    }

    /// The matching documents at positions `range`, reduced to the values
    /// at `paths`.
    pub fn all_in_range_and_project_paths(
        &self,
        range: Range<usize>,
        paths: &[&str],
    ) -> CoreResult<Vec<Value>> {
        self.all_in_range_and_project(range, |document| project_paths(document, paths))
    }

    /// The first matching document.
    pub fn first(&self) -> CoreResult<Option<Value>> {
        Ok(self.read("first", &Window::FIRST)?.into_iter().next())
    }

    /// The first matching document, mapped through `project`.
    pub fn first_and_project<T, F>(&self, project: F) -> CoreResult<Option<T>>
    where
        F: FnOnce(&Value) -> T,
    {
        Ok(self.first()?.as_ref().map(project))
    }

    /// The first matching document, reduced to the values at `paths`.
    pub fn first_and_project_paths(&self, paths: &[&str]) -> CoreResult<Option<Value>> {
        self.first_and_project(|document| project_paths(document, paths))
    }

    // ---- writes ----

    fn modify(
        &self,
        operation: &str,
        window: &Window,
        callback: Option<Callback<'_>>,
    ) -> CoreResult<Modified> {
        let result = self.db.write_txn().and_then(|mut txn| {
            let modified = self.modify_in(&mut txn, operation, window, callback)?;
            txn.commit()?;
            Ok(modified)
        });
        self.db.observe(result)
    }

    fn modify_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        operation: &str,
        window: &Window,
        callback: Option<Callback<'_>>,
    ) -> CoreResult<Modified> {
        let result = self.apply(txn, window, callback);
        match &result {
            Ok(modified) => {
                self.log(operation, modified.updated + modified.removed);
            }
            Err(error) => {
                if txn.is_active() {
                    txn.rollback()?;
                }
                debug!(operation, collection = self.view.collection(), %error, "modify aborted");
            }
        }
        result
    }

    fn apply(
        &self,
        txn: &mut WriteTransaction<'_>,
        window: &Window,
        mut callback: Option<Callback<'_>>,
    ) -> CoreResult<Modified> {
        txn.state().ensure_active()?;
        let collection = self.view.collection();
        let ids = window.apply(self.view.resolve(&txn.view()));
        let mut modified = Modified::default();

        for id in ids {
            let Some(old) = txn.get(collection, &id)? else {
                continue;
            };
            let mut new = old.clone();
            let outcome = match callback.as_mut() {
                Some(callback) => callback(&mut new),
                None => ModifyOutcome::REMOVE,
            };
            if outcome.contains(ModifyOutcome::ROLLBACK) {
                return Err(CoreError::CallbackAbort);
            }
            let outcome = outcome.validate()?;

            let stored = if outcome.contains(ModifyOutcome::UPDATE) {
                self.check_identifier(&id, &old, &new)?;
                txn.put(collection, id.clone(), &new)?;
                modified.updated += 1;
                Some(new)
            } else if outcome.contains(ModifyOutcome::REMOVE) {
                txn.remove(collection, &id)?;
                modified.removed += 1;
                None
            } else {
                Some(old.clone())
            };

            if outcome.contains(ModifyOutcome::RETURN_OLD) {
                modified.documents.push(old);
            }
            if outcome.contains(ModifyOutcome::RETURN_NEW) {
                if let Some(stored) = stored {
                    modified.documents.push(stored);
                }
            }
            if outcome.contains(ModifyOutcome::STOP) {
                break;
            }
        }
        Ok(modified)
    }

    /// An update may not move a document to another identifier.
    fn check_identifier(&self, id: &DocumentId, old: &Value, new: &Value) -> CoreResult<()> {
        let Some(path) = self.db.config().identifier_path.as_deref() else {
            return Ok(());
        };
        if value_at(old, path) == value_at(new, path) {
            return Ok(());
        }
        Err(CoreError::write_conflict(
            self.view.collection(),
            id,
            format!("update changes the identifier at {path}"),
        ))
    }

    /// Runs `modify` on every matching document in one transaction.
    ///
    /// Returns the documents selected by the `RETURN_*` flags, in order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CallbackAbort`] if the callback asks for a
    /// rollback; nothing is written then.
    pub fn all_and_modify<F>(&self, mut modify: F) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify("all_and_modify", &Window::All, Some(&mut modify))?
            .documents)
    }

    /// Runs `modify` on the matching documents at positions `range`.
    pub fn all_in_range_and_modify<F>(
        &self,
        range: Range<usize>,
        mut modify: F,
    ) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify("all_in_range_and_modify", &Window::Range(range), Some(&mut modify))?
            .documents)
    }

    /// Runs `modify` on the first matching document.
    pub fn first_and_modify<F>(&self, mut modify: F) -> CoreResult<Option<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify("first_and_modify", &Window::FIRST, Some(&mut modify))?
            .documents
            .into_iter()
            .next())
    }

    /// Removes every matching document. Returns how many were removed.
    pub fn remove_all(&self) -> CoreResult<usize> {
        Ok(self.modify("remove_all", &Window::All, None)?.removed)
    }

    /// Removes the matching documents at positions `range`.
    pub fn remove_all_in_range(&self, range: Range<usize>) -> CoreResult<usize> {
        Ok(self
            .modify("remove_all_in_range", &Window::Range(range), None)?
            .removed)
    }

    /// Removes the first matching document.
    pub fn remove_first(&self) -> CoreResult<usize> {
        Ok(self.modify("remove_first", &Window::FIRST, None)?.removed)
    }

    // ---- writes inside a caller's transaction ----

    fn modify_shared(
        &self,
        txn: &mut WriteTransaction<'_>,
        operation: &str,
        window: &Window,
        callback: Option<Callback<'_>>,
    ) -> CoreResult<Modified> {
        let result = self.modify_in(txn, operation, window, callback);
        self.db.observe(result)
    }

    /// [`all_and_modify`](Self::all_and_modify) inside `txn`. A rollback
    /// or an error aborts `txn`.
    pub fn all_and_modify_in<F>(
        &self,
        txn: &mut WriteTransaction<'_>,
        mut modify: F,
    ) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify_shared(txn, "all_and_modify", &Window::All, Some(&mut modify))?
            .documents)
    }

    /// [`all_in_range_and_modify`](Self::all_in_range_and_modify) inside
    /// `txn`.
    pub fn all_in_range_and_modify_in<F>(
        &self,
        txn: &mut WriteTransaction<'_>,
        range: Range<usize>,
        mut modify: F,
    ) -> CoreResult<Vec<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify_shared(
                txn,
                "all_in_range_and_modify",
                &Window::Range(range),
                Some(&mut modify),
            )?
            .documents)
    }

    /// [`first_and_modify`](Self::first_and_modify) inside `txn`.
    pub fn first_and_modify_in<F>(
        &self,
        txn: &mut WriteTransaction<'_>,
        mut modify: F,
    ) -> CoreResult<Option<Value>>
    where
        F: FnMut(&mut Value) -> ModifyOutcome,
    {
        Ok(self
            .modify_shared(txn, "first_and_modify", &Window::FIRST, Some(&mut modify))?
            .documents
            .into_iter()
            .next())
    }

    /// [`remove_all`](Self::remove_all) inside `txn`.
    pub fn remove_all_in(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<usize> {
        Ok(self
            .modify_shared(txn, "remove_all", &Window::All, None)?
            .removed)
    }

    /// [`remove_all_in_range`](Self::remove_all_in_range) inside `txn`.
    pub fn remove_all_in_range_in(
        &self,
        txn: &mut WriteTransaction<'_>,
        range: Range<usize>,
    ) -> CoreResult<usize> {
        Ok(self
            .modify_shared(txn, "remove_all_in_range", &Window::Range(range), None)?
            .removed)
    }

    /// [`remove_first`](Self::remove_first) inside `txn`.
    pub fn remove_first_in(&self, txn: &mut WriteTransaction<'_>) -> CoreResult<usize> {
        Ok(self
            .modify_shared(txn, "remove_first", &Window::FIRST, None)?
            .removed)
    }
}

/// An object mapping each of `paths` to the value there, `null` if absent.
fn project_paths(document: &Value, paths: &[&str]) -> Value {
    paths
        .iter()
        .map(|path| {
            let value = value_at(document, path).cloned().unwrap_or_default();
            ((*path).to_string(), value)
        })
        .collect()
}
