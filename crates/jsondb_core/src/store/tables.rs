//! Physical tables of one collection.

use crate::document::DocumentId;
use crate::flatten::{FlatDocument, Scalar};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// A stored document: its encoded bytes and its flat entries.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Encoded document.
    pub raw: Bytes,
    /// Flat entries, empty if the bytes could not be decoded.
    pub flat: Arc<FlatDocument>,
}

/// Secondary access path: path, then scalar (type first), then identifiers.
type PathIndex = BTreeMap<String, BTreeMap<Scalar, BTreeSet<DocumentId>>>;

/// The tables of one collection.
///
/// - documents keyed by identifier, each with its flat entries keyed by path
/// - an index from `(path, type, scalar)` to identifiers
///
/// Element paths of array members are indexed alongside exact paths.
#[derive(Debug, Clone, Default)]
pub struct CollectionTables {
    documents: BTreeMap<DocumentId, StoredDocument>,
    index: PathIndex,
}

impl CollectionTables {
    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns the stored document with `id`.
    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<&StoredDocument> {
        self.documents.get(id)
    }

    /// Returns true if a document with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    /// Iterates over identifiers in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }

    /// Iterates over documents in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &StoredDocument)> {
        self.documents.iter()
    }

    /// Stores a document, replacing and unindexing any previous version.
    pub fn put(&mut self, id: DocumentId, document: StoredDocument) {
        self.unindex(&id);
        for (path, scalars) in document.flat.paths() {
            let by_value = self.index.entry(path.to_string()).or_default();
            for scalar in scalars {
                by_value.entry(scalar.clone()).or_default().insert(id.clone());
            }
        }
        self.documents.insert(id, document);
    }

    /// Removes a document. Returns true if it existed.
    pub fn remove(&mut self, id: &DocumentId) -> bool {
        self.unindex(id);
        self.documents.remove(id).is_some()
    }

    fn unindex(&mut self, id: &DocumentId) {
        let Some(previous) = self.documents.get(id) else {
            return;
        };
        for (path, scalars) in previous.flat.paths() {
            let Some(by_value) = self.index.get_mut(path) else {
                continue;
            };
            for scalar in scalars {
                if let Some(ids) = by_value.get_mut(scalar) {
                    ids.remove(id);
                    if ids.is_empty() {
                        by_value.remove(scalar);
                    }
                }
            }
            if by_value.is_empty() {
                self.index.remove(path);
            }
        }
    }

    /// Identifiers with an entry equal to `scalar` at `path`.
    pub fn seek_point(&self, path: &str, scalar: &Scalar, out: &mut BTreeSet<DocumentId>) {
        if let Some(ids) = self.index.get(path).and_then(|by_value| by_value.get(scalar)) {
            out.extend(ids.iter().cloned());
        }
    }

    /// Identifiers with an entry inside `(lower, upper)` at `path`.
    pub fn seek_range(
        &self,
        path: &str,
        lower: Bound<&Scalar>,
        upper: Bound<&Scalar>,
        out: &mut BTreeSet<DocumentId>,
    ) {
        if !range_is_valid(lower, upper) {
            return;
        }
        if let Some(by_value) = self.index.get(path) {
            for ids in by_value.range::<Scalar, _>((lower, upper)).map(|(_, ids)| ids) {
                out.extend(ids.iter().cloned());
            }
        }
    }

    /// Identifiers with any entry at `path`.
    pub fn seek_path(&self, path: &str, out: &mut BTreeSet<DocumentId>) {
        if let Some(by_value) = self.index.get(path) {
            for ids in by_value.values() {
                out.extend(ids.iter().cloned());
            }
        }
    }

    /// Number of distinct values indexed at `path`.
    #[must_use]
    pub fn distinct_values(&self, path: &str) -> usize {
        self.index.get(path).map_or(0, BTreeMap::len)
    }
}

/// `BTreeMap::range` panics on inverted or empty-exclusive ranges.
fn range_is_valid(lower: Bound<&Scalar>, upper: Bound<&Scalar>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo <= hi,
        (Bound::Included(lo) | Bound::Excluded(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi)) => lo < hi,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsondb_codec::{encode_document, Value};

    fn stored(id: &DocumentId, json: &str) -> StoredDocument {
        let value = Value::from_json_str(json).unwrap();
        StoredDocument {
            raw: Bytes::from(encode_document(&value).unwrap()),
            flat: Arc::new(FlatDocument::new(id, &value)),
        }
    }

    fn tables() -> CollectionTables {
        let mut tables = CollectionTables::default();
        for (id, json) in [
            (1, r#"{"name": "Ann", "score": 10, "tags": ["a", "b"]}"#),
            (2, r#"{"name": "Bob", "score": 20, "tags": ["b"]}"#),
            (3, r#"{"name": "Cid", "score": "high"}"#),
        ] {
            let id = DocumentId::from(id);
            let doc = stored(&id, json);
            tables.put(id, doc);
        }
        tables
    }

    fn ids(set: &BTreeSet<DocumentId>) -> Vec<DocumentId> {
        set.iter().cloned().collect()
    }

    #[test]
    fn point_seek_on_exact_and_element_paths() {
        let tables = tables();
        let mut out = BTreeSet::new();
        tables.seek_point("tags", &Scalar::String("b".into()), &mut out);
        assert_eq!(ids(&out), vec![DocumentId::from(1), DocumentId::from(2)]);

        out.clear();
        tables.seek_point("tags.0", &Scalar::String("b".into()), &mut out);
        assert_eq!(ids(&out), vec![DocumentId::from(2)]);
    }

    #[test]
    fn range_seek_is_type_bounded_by_caller() {
        let tables = tables();
        let mut out = BTreeSet::new();
        let lo = Scalar::Number(15.into());
        tables.seek_range(
            "score",
            Bound::Included(&lo),
            Bound::Unbounded,
            &mut out,
        );
        // Unbounded above reaches the string score as well.
        assert_eq!(ids(&out), vec![DocumentId::from(2), DocumentId::from(3)]);
    }

    #[test]
    fn inverted_ranges_are_empty() {
        let tables = tables();
        let mut out = BTreeSet::new();
        let lo = Scalar::Number(20.into());
        let hi = Scalar::Number(10.into());
        tables.seek_range("score", Bound::Included(&lo), Bound::Included(&hi), &mut out);
        tables.seek_range("score", Bound::Excluded(&lo), Bound::Excluded(&lo), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn replacing_a_document_reindexes_it() {
        let mut tables = tables();
        let id = DocumentId::from(1);
        let doc = stored(&id, r#"{"name": "Ann", "score": 99}"#);
        tables.put(id.clone(), doc);

        let mut out = BTreeSet::new();
        tables.seek_point("score", &Scalar::Number(10.into()), &mut out);
        assert!(out.is_empty());
        tables.seek_path("tags", &mut out);
        assert_eq!(ids(&out), vec![DocumentId::from(2)]);
        assert_eq!(tables.len(), 3);
    }

    #[test]
    fn removing_a_document_unindexes_it() {
        let mut tables = tables();
        assert!(tables.remove(&DocumentId::from(2)));
        assert!(!tables.remove(&DocumentId::from(2)));
        assert_eq!(tables.distinct_values("tags"), 2);

        let mut out = BTreeSet::new();
        tables.seek_path("name", &mut out);
        assert_eq!(ids(&out), vec![DocumentId::from(1), DocumentId::from(3)]);
    }
}
