use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::manager::DatabaseError;

pub const CLIENTS: &str = "clients";
pub const TASKS: &str = "tasks";
pub const INQUIRIES: &str = "inquiries";
pub const INTERACTIONS: &str = "interactions";
pub const USERS: &str = "users";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("stored document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Equality filters over top-level document fields, combined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Map<String, Value>,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

/// Raw storage the service layer sits in front of. Documents are JSON objects
/// carrying their own `id`; ordering of `query` results is by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Returns whether a document was removed
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn query(&self, collection: &str, query: &DocumentQuery) -> Result<Vec<Value>, StoreError>;
}
