use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    Document, DocumentStore, FindOptions, Filter, Sort, SortOrder, compare_values, validate_name,
};

#[derive(Default)]
struct Collections {
    docs: HashMap<String, Vec<Document>>,
    /// collection -> fields declared unique
    unique: HashMap<String, Vec<String>>,
}

impl Collections {
    fn check_unique(&self, collection: &str, candidate: &Document, skip: Option<usize>) -> StoreResult<()> {
        let Some(fields) = self.unique.get(collection) else {
            return Ok(());
        };
        let existing = self.docs.get(collection).map(Vec::as_slice).unwrap_or_default();

        for field in fields {
            let Some(value) = candidate.get(field) else { continue };
            let clash = existing
                .iter()
                .enumerate()
                .any(|(i, doc)| Some(i) != skip && doc.get(field) == Some(value));
            if clash {
                return Err(StoreError::Duplicate {
                    collection: collection.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Process-local document store. Nothing is persisted.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Collections) -> StoreResult<T>,
    {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut inner)
    }
}

fn matching<'a>(docs: &'a [Document], filter: &Filter, sort: Option<&Sort>) -> Vec<&'a Document> {
    let mut found: Vec<&Document> = docs.iter().filter(|d| filter.matches(d)).collect();
    if let Some(sort) = sort {
        // Stable sort keeps insertion order between equal keys.
        found.sort_by(|a, b| {
            let ord = compare_values(a.get(&sort.field), b.get(&sort.field));
            match sort.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }
    found
}

impl DocumentStore for MemoryStore {
    fn ping(&self) -> StoreResult<()> {
        self.with_inner(|_| Ok(()))
    }

    fn insert(&self, collection: &str, doc: Document) -> StoreResult<()> {
        validate_name(collection)?;
        self.with_inner(|inner| {
            inner.check_unique(collection, &doc, None)?;
            inner.docs.entry(collection.to_string()).or_default().push(doc);
            Ok(())
        })
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> StoreResult<Option<Document>> {
        self.with_inner(|inner| {
            let docs = inner.docs.get(collection).map(Vec::as_slice).unwrap_or_default();
            Ok(matching(docs, filter, sort).first().map(|d| (*d).clone()))
        })
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.with_inner(|inner| {
            let docs = inner.docs.get(collection).map(Vec::as_slice).unwrap_or_default();
            let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
            let limit = options
                .limit
                .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
                .unwrap_or(usize::MAX);

            Ok(matching(docs, filter, options.sort.as_ref())
                .into_iter()
                .skip(skip)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.with_inner(|inner| {
            let docs = inner.docs.get(collection).map(Vec::as_slice).unwrap_or_default();
            Ok(docs.iter().filter(|d| filter.matches(d)).count() as u64)
        })
    }

    fn update_one_set(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> StoreResult<u64> {
        for field in fields.keys() {
            validate_name(field)?;
        }

        self.with_inner(|inner| {
            let Some(index) = inner
                .docs
                .get(collection)
                .and_then(|docs| docs.iter().position(|d| filter.matches(d)))
            else {
                return Ok(0);
            };

            let mut updated = inner.docs[collection][index].clone();
            updated.extend(fields);
            inner.check_unique(collection, &updated, Some(index))?;

            if let Some(docs) = inner.docs.get_mut(collection) {
                docs[index] = updated;
            }
            Ok(1)
        })
    }

    fn ensure_unique_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        validate_name(collection)?;
        validate_name(field)?;

        self.with_inner(|inner| {
            let fields = inner.unique.entry(collection.to_string()).or_default();
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
            Ok(())
        })
    }
}
