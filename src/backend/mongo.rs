//! MongoDB backend, talking to a cluster through the official async driver.
//!
//! Documents cross the boundary as JSON: `_id` travels as a 24-hex string in
//! the API and as an `ObjectId` in the database, and everything else is
//! converted to relaxed extended JSON on the way out.
//!
//! # Configuration Example
//! ```yaml
//! database:
//!   backend: "mongo"
//!   user: "lifedrops"
//!   password: "..."
//!   host: "cluster0.example.mongodb.net"
//! ```

use crate::model::Collection;
use crate::query::{DeleteResult, Filter, FindOptions, InsertOneResult, Update, UpdateResult};
use crate::{DocumentStore, Document, ID_FIELD, StoreError, StoreResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, Document as BsonDocument, doc, oid::ObjectId};
use mongodb::options::{
    ClientOptions, FindOptions as DriverFindOptions, ServerApi, ServerApiVersion, UpdateOptions,
};
use mongodb::Client;
use serde_json::Value;

/// MongoDB-backed document store.
///
/// `Client` is internally reference counted and pools its connections, so one
/// backend is shared by every request.
pub struct MongoBackend {
    client: Client,
}

impl MongoBackend {
    /// Connect with the Stable API pinned to v1 in strict mode.
    ///
    /// The driver connects lazily; call [`DocumentStore::ping`] to find out
    /// whether the deployment is actually reachable.
    pub async fn connect(uri: &str) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(StoreError::backend)?;
        let server_api = ServerApi::builder()
            .version(ServerApiVersion::V1)
            .strict(true)
            .deprecation_errors(true)
            .build();
        options.server_api = Some(server_api);
        let client = Client::with_options(options).map_err(StoreError::backend)?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<BsonDocument> {
        self.client
            .database(collection.database())
            .collection(collection.name())
    }
}

fn object_id(id: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn json_to_bson(value: &Value) -> StoreResult<Bson> {
    bson::to_bson(value).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn filter_to_bson(filter: &Filter) -> StoreResult<BsonDocument> {
    let mut out = BsonDocument::new();
    for (field, value) in filter.conditions() {
        let value = match (field.as_str(), value) {
            (ID_FIELD, Value::String(id)) => Bson::ObjectId(object_id(id)?),
            _ => json_to_bson(value)?,
        };
        out.insert(field.clone(), value);
    }
    Ok(out)
}

fn document_to_bson(doc: &Document) -> StoreResult<BsonDocument> {
    let mut out =
        bson::to_document(doc).map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
    if let Some(Value::String(id)) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD, object_id(id)?);
    }
    Ok(out)
}

/// Counts travel as signed 64-bit integers; a `u64` past `i64::MAX` would
/// wrap negative, which the server reads as a different request.
fn driver_count(name: &str, value: u64) -> StoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidDocument(format!("{name} {value} is out of range")))
}

fn bson_id_to_string(id: Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s,
        other => other.to_string(),
    }
}

fn bson_to_document(mut raw: BsonDocument) -> Document {
    let id = raw.remove(ID_FIELD);
    let mut doc = match Bson::Document(raw).into_relaxed_extjson() {
        Value::Object(map) => map,
        _ => Document::new(),
    };
    if let Some(id) = id {
        doc.insert(ID_FIELD.to_string(), Value::String(bson_id_to_string(id)));
    }
    doc
}

#[async_trait]
impl DocumentStore for MongoBackend {
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let mut driver_options = DriverFindOptions::default();
        driver_options.sort = options.sort.as_ref().map(|(field, order)| {
            let mut sort = BsonDocument::new();
            sort.insert(field.clone(), order.as_i32());
            sort
        });
        driver_options.skip = options
            .skip
            .map(|skip| driver_count("skip", skip).map(|_| skip))
            .transpose()?;
        driver_options.limit = options
            .limit
            .map(|limit| driver_count("limit", limit))
            .transpose()?;

        let cursor = self
            .collection(collection)
            .find(filter_to_bson(filter)?, driver_options)
            .await
            .map_err(StoreError::backend)?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await.map_err(StoreError::backend)?;
        Ok(docs.into_iter().map(bson_to_document).collect())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(filter_to_bson(filter)?, None)
            .await
            .map_err(StoreError::backend)?;
        Ok(found.map(bson_to_document))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> StoreResult<InsertOneResult> {
        let result = self
            .collection(collection)
            .insert_one(document_to_bson(&doc)?, None)
            .await
            .map_err(StoreError::backend)?;
        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: bson_id_to_string(result.inserted_id),
        })
    }

    /// An upsert whose update is `$setOnInsert`, so a match is left
    /// untouched. Concurrent callers are serialized by the server only when
    /// the filter fields carry a unique index.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        filter: &Filter,
        doc: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        let mut options = UpdateOptions::default();
        options.upsert = Some(true);

        let on_insert = document_to_bson(&doc)?;
        let result = self
            .collection(collection)
            .update_one(
                filter_to_bson(filter)?,
                doc! { "$setOnInsert": on_insert },
                options,
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(result.upserted_id.map(|id| InsertOneResult {
            acknowledged: true,
            inserted_id: bson_id_to_string(id),
        }))
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
        let mut options = UpdateOptions::default();
        options.upsert = Some(upsert);

        let set = document_to_bson(update.fields())?;
        let result = self
            .collection(collection)
            .update_one(filter_to_bson(filter)?, doc! { "$set": set }, options)
            .await
            .map_err(StoreError::backend)?;
        let upserted_id = result.upserted_id.map(bson_id_to_string);
        Ok(UpdateResult {
            acknowledged: true,
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_count: u64::from(upserted_id.is_some()),
            upserted_id,
        })
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<DeleteResult> {
        let result = self
            .collection(collection)
            .delete_one(filter_to_bson(filter)?, None)
            .await
            .map_err(StoreError::backend)?;
        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.collection(collection)
            .count_documents(filter_to_bson(filter)?, None)
            .await
            .map_err(StoreError::backend)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(StoreError::backend)?;
        tracing::debug!("mongo ping succeeded");
        Ok(())
    }
}
