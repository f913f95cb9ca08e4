use crate::model::Collection;
use crate::query::{
    DeleteResult, Filter, FindOptions, InsertOneResult, Update, UpdateResult, generate_id,
    is_object_id,
};
use crate::{Document, ID_FIELD, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The handful of driver operations the API is built from.
///
/// Every handler performs exactly one of these calls, so the trait mirrors the
/// driver's collection methods rather than any higher-level repository shape.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents matching `filter`, ordered and windowed by `options`.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;
    /// The first document matching `filter`.
    async fn find_one(&self, collection: Collection, filter: &Filter)
    -> StoreResult<Option<Document>>;
    /// Insert a document, assigning an `_id` when it has none.
    async fn insert_one(&self, collection: Collection, doc: Document)
    -> StoreResult<InsertOneResult>;
    /// Insert `doc` unless some document already matches `filter`, as one
    /// operation. `None` means a match existed and nothing was written.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Document,
    ) -> StoreResult<Option<InsertOneResult>>;
    /// Apply `update` to the first match; with `upsert`, insert when nothing matches.
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StoreResult<UpdateResult>;
    /// Remove the first document matching `filter`.
    async fn delete_one(&self, collection: Collection, filter: &Filter)
    -> StoreResult<DeleteResult>;
    /// Number of documents matching `filter`.
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
    /// Round-trip to the backend to prove it is reachable.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use lifedrops::BackendConfig;
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // MongoDB
/// let config = BackendConfig::mongo("mongodb://localhost:27017");
/// ```
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    /// Use an in-memory map of collections. Nothing survives a restart.
    #[default]
    InMemory,
    /// Use a MongoDB deployment reachable at `uri`.
    ///
    /// Requires the `backend-mongo` feature (enabled by default).
    Mongo { uri: String },
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn mongo<U: Into<String>>(uri: U) -> Self {
        BackendConfig::Mongo { uri: uri.into() }
    }

    /// Build the backend. The Mongo variant connects to the cluster, so this
    /// is async.
    pub async fn build(&self) -> StoreResult<Arc<dyn DocumentStore>> {
        match self {
            BackendConfig::InMemory => Ok(Arc::new(InMemoryBackend::new())),
            BackendConfig::Mongo { uri } => {
                #[cfg(feature = "backend-mongo")]
                {
                    Ok(Arc::new(MongoBackend::connect(uri).await?))
                }
                #[cfg(not(feature = "backend-mongo"))]
                {
                    let _ = uri;
                    Err(StoreError::backend("mongo backend disabled at compile time"))
                }
            }
        }
    }
}

/// An in-memory backend using a `RwLock` around one `Vec` per collection.
///
/// Documents keep insertion order, which is what an unsorted `find` returns.
pub struct InMemoryBackend {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read<T>(
        &self,
        collection: Collection,
        f: impl FnOnce(&[Document]) -> T,
    ) -> StoreResult<T> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(f(guard.get(&collection).map(Vec::as_slice).unwrap_or(&[])))
    }

    fn write<T>(
        &self,
        collection: Collection,
        f: impl FnOnce(&mut Vec<Document>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        f(guard.entry(collection).or_default())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Make sure `doc` carries a well-formed `_id` and return it.
fn ensure_id(doc: &mut Document) -> StoreResult<String> {
    match doc.get(ID_FIELD) {
        Some(Value::String(id)) if is_object_id(id) => {
            let id = id.to_ascii_lowercase();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
        Some(other) => Err(StoreError::InvalidId(other.to_string())),
        None => {
            let id = generate_id();
            doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryBackend {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let matched = self.read(collection, |docs| {
            docs.iter()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        Ok(options.apply(matched))
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        self.read(collection, |docs| {
            docs.iter().find(|d| filter.matches(d)).cloned()
        })
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> StoreResult<InsertOneResult> {
        let id = ensure_id(&mut doc)?;
        self.write(collection, |docs| {
            if docs.iter().any(|d| d.get(ID_FIELD) == doc.get(ID_FIELD)) {
                return Err(StoreError::InvalidDocument(format!(
                    "duplicate key: _id {id}"
                )));
            }
            docs.push(doc);
            Ok(InsertOneResult {
                acknowledged: true,
                inserted_id: id,
            })
        })
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        mut doc: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        let id = ensure_id(&mut doc)?;
        // Check and insert under one write lock.
        self.write(collection, |docs| {
            if docs.iter().any(|d| filter.matches(d)) {
                return Ok(None);
            }
            if docs.iter().any(|d| d.get(ID_FIELD) == doc.get(ID_FIELD)) {
                return Err(StoreError::InvalidDocument(format!(
                    "duplicate key: _id {id}"
                )));
            }
            docs.push(doc);
            Ok(Some(InsertOneResult {
                acknowledged: true,
                inserted_id: id,
            }))
        })
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> StoreResult<UpdateResult> {
        if update.is_empty() {
            return Err(StoreError::InvalidDocument(
                "update document is empty".to_string(),
            ));
        }
        self.write(collection, |docs| {
            if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
                let modified = update.apply(doc);
                return Ok(UpdateResult {
                    acknowledged: true,
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_count: 0,
                    upserted_id: None,
                });
            }
            if !upsert {
                return Ok(UpdateResult {
                    acknowledged: true,
                    ..UpdateResult::default()
                });
            }
            // Upserts seed the new document with the equality fields of the filter.
            let mut doc = filter.to_document();
            update.apply(&mut doc);
            let id = ensure_id(&mut doc)?;
            docs.push(doc);
            Ok(UpdateResult {
                acknowledged: true,
                matched_count: 0,
                modified_count: 0,
                upserted_count: 1,
                upserted_id: Some(id),
            })
        })
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<DeleteResult> {
        self.write(collection, |docs| {
            let deleted = match docs.iter().position(|d| filter.matches(d)) {
                Some(pos) => {
                    docs.remove(pos);
                    1
                }
                None => 0,
            };
            Ok(DeleteResult {
                acknowledged: true,
                deleted_count: deleted,
            })
        })
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.read(collection, |docs| {
            docs.iter().filter(|d| filter.matches(d)).count() as u64
        })
    }
}

/// The MongoDB backend implementation.
#[cfg(feature = "backend-mongo")]
pub mod mongo;

#[cfg(feature = "backend-mongo")]
pub use mongo::MongoBackend;
