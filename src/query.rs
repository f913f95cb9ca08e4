use crate::{Document, ID_FIELD, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns true when `id` has the textual shape of a MongoDB ObjectId.
pub fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Generate a fresh 24-hex identifier laid out like an ObjectId: 4 bytes of
/// seconds since the epoch, 5 bytes fixed per process, 3 bytes of counter.
/// Ids from one process therefore sort in creation order.
pub fn generate_id() -> String {
    static PROCESS_UNIQUE: OnceLock<String> = OnceLock::new();
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let process = PROCESS_UNIQUE.get_or_init(|| {
        let random = uuid::Uuid::new_v4().simple().to_string();
        random[..10].to_string()
    });
    let count = COUNTER.fetch_add(1, AtomicOrdering::Relaxed) & 0x00ff_ffff;
    format!("{secs:08x}{process}{count:06x}")
}

/// Conjunction of top-level field equality conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// The empty filter matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a single document by `_id`. Hex digits are case-insensitive;
    /// stored ids are lowercase.
    pub fn by_id(id: &str) -> StoreResult<Self> {
        if !is_object_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(Self::new().eq(ID_FIELD, id.to_ascii_lowercase()))
    }

    pub fn eq<V: Into<Value>>(mut self, field: impl Into<String>, value: V) -> Self {
        let field = field.into();
        let value = value.into();
        match self.conditions.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = value,
            None => self.conditions.push((field, value)),
        }
        self
    }

    /// Add a condition only when a non-empty value was supplied.
    pub fn eq_opt<S: AsRef<str>>(self, field: impl Into<String>, value: Option<S>) -> Self {
        match value {
            Some(v) if !v.as_ref().is_empty() => self.eq(field, v.as_ref()),
            _ => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.conditions
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }

    /// The filter as a plain document, e.g. `{ "status": "pending" }`.
    pub fn to_document(&self) -> Document {
        self.conditions.iter().cloned().collect()
    }
}

/// A `$set` update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    /// `_id` is immutable and is dropped from the set.
    pub fn set(mut fields: Document) -> Self {
        fields.remove(ID_FIELD);
        Self { set: fields }
    }

    pub fn set_field<V: Into<Value>>(field: impl Into<String>, value: V) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set<V: Into<Value>>(mut self, field: impl Into<String>, value: V) -> Self {
        let field = field.into();
        if field != ID_FIELD {
            self.set.insert(field, value.into());
        }
        self
    }

    pub fn fields(&self) -> &Document {
        &self.set
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Apply the set to `doc`, returning whether any field actually changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if doc.get(field) != Some(value) {
                doc.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Direction as the driver spells it in a sort document.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Sort, skip and limit for `find`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Zero-based page of `size` documents. A missing or zero size means
    /// "no pagination".
    pub fn paginate(self, page: Option<u64>, size: Option<u64>) -> Self {
        match size {
            Some(size) if size > 0 => self
                .with_skip(page.unwrap_or(0).saturating_mul(size))
                .with_limit(size),
            _ => self,
        }
    }

    /// Order, offset and truncate an in-process result set the way the
    /// server would.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some((field, order)) = &self.sort {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        let skip = self.skip.unwrap_or(0) as usize;
        let iter = docs.into_iter().skip(skip);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}

/// Missing fields sort lowest, as they do on the server.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Numbers sort before strings, strings before everything else.
        (Some(x), Some(y)) => type_rank(x).cmp(&type_rank(y)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Result of `insertOne`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// Result of `updateOne`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

/// Result of `deleteOne`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}
