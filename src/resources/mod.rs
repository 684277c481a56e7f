//! Resource handlers behind the pipeline.
//!
//! A [`ResourceHandler`] only ever sees requests that passed rate limiting,
//! CSRF verification and validation. Records are opaque JSON objects.

pub mod questions;

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::ApiError;

pub use questions::QuestionHandler;

/// CRUD over one collection of records.
pub trait ResourceHandler: Send + Sync {
    /// Records matching the query filters.
    fn list<'a>(&'a self, query: &'a HashMap<String, String>) -> BoxFuture<'a, Result<Vec<Value>, ApiError>>;

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn create(&self, body: Value) -> BoxFuture<'_, Result<Value, ApiError>>;

    fn update<'a>(&'a self, id: &'a str, body: Value) -> BoxFuture<'a, Result<Value, ApiError>>;

    /// Remove a record, returning it.
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;
}
