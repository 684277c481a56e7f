//! Quiz question resource backed by the document store.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::resources::ResourceHandler;
use crate::store::{Document, MemoryStore};

/// Fields a question document may carry. Anything else is dropped.
pub const QUESTION_FIELDS: [&str; 5] = ["question", "answer", "category", "context", "questionNumber"];

pub struct QuestionHandler {
    store: Arc<MemoryStore>,
}

impl QuestionHandler {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn not_found() -> ApiError {
        ApiError::not_found("Question not found")
    }
}

/// Keep only the known question fields of a JSON body.
fn question_fields(body: Value) -> Document {
    match body {
        Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| QUESTION_FIELDS.contains(&key.as_str()))
            .collect(),
        _ => Map::new(),
    }
}

impl ResourceHandler for QuestionHandler {
    fn list<'a>(&'a self, query: &'a HashMap<String, String>) -> BoxFuture<'a, Result<Vec<Value>, ApiError>> {
        Box::pin(async move {
            let category = query.get("category").map(|c| c.as_str());
            let docs = self.store.find(|doc| match category {
                Some(category) => doc.get("category").and_then(Value::as_str) == Some(category),
                None => true,
            })?;
            Ok(docs.into_iter().map(Value::Object).collect())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            self.store
                .get(id)?
                .map(Value::Object)
                .ok_or_else(Self::not_found)
        })
    }

    fn create(&self, body: Value) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(async move {
            let saved = self.store.insert(question_fields(body))?;
            tracing::info!(id = ?saved.get("_id"), "Question created");
            Ok(Value::Object(saved))
        })
    }

    fn update<'a>(&'a self, id: &'a str, body: Value) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            self.store
                .update(id, question_fields(body))?
                .map(Value::Object)
                .ok_or_else(Self::not_found)
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            let removed = self.store.remove(id)?.ok_or_else(Self::not_found)?;
            tracing::info!(id = %id, "Question deleted");
            Ok(Value::Object(removed))
        })
    }
}
