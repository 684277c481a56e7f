//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use quiz_gateway::config::{Environment, GatewayConfig};
use quiz_gateway::error::ApiError;
use quiz_gateway::http::HttpServer;
use quiz_gateway::lifecycle::{ShutdownCoordinator, ShutdownOutcome};
use quiz_gateway::resources::questions::QuestionHandler;
use quiz_gateway::resources::ResourceHandler;
use quiz_gateway::store::{DataStore, MemoryStore, StoreError};

/// Data store double with a readiness toggle, a close counter and an
/// optional close delay.
pub struct MockStore {
    ready: AtomicBool,
    closes: AtomicUsize,
    close_delay: Duration,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Self::with_close_delay(Duration::ZERO)
    }

    pub fn with_close_delay(close_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(true),
            closes: AtomicUsize::new(0),
            close_delay,
        })
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl DataStore for MockStore {
    fn name(&self) -> &str {
        "cquizy"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.closes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.close_delay).await;
            self.ready.store(false, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Question handler whose list call takes `delay` to answer.
pub struct SlowQuestions {
    pub delay: Duration,
}

impl ResourceHandler for SlowQuestions {
    fn list<'a>(&'a self, _query: &'a HashMap<String, String>) -> BoxFuture<'a, Result<Vec<Value>, ApiError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        })
    }

    fn get<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async { Err(ApiError::not_found("Question not found")) })
    }

    fn create(&self, body: Value) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(async move { Ok(body) })
    }

    fn update<'a>(&'a self, _id: &'a str, body: Value) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move { Ok(body) })
    }

    fn delete<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async { Err(ApiError::not_found("Question not found")) })
    }
}

/// A gateway bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub coordinator: Arc<ShutdownCoordinator>,
    pub handle: JoinHandle<std::io::Result<ShutdownOutcome>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Signal shutdown and wait for the outcome.
    pub async fn shutdown(self) -> ShutdownOutcome {
        self.coordinator.initiate("SIGTERM");
        self.handle.await.unwrap().unwrap()
    }
}

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.environment = Environment::Test;
    config.server.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Serve `config` backed by a fresh in-memory store.
pub async fn spawn_server(config: GatewayConfig) -> TestServer {
    let store = Arc::new(MemoryStore::in_memory("cquizy"));
    let questions = Arc::new(QuestionHandler::new(store.clone()));
    spawn_with(config, store, questions, Duration::from_secs(10)).await
}

pub async fn spawn_with(
    config: GatewayConfig,
    store: Arc<dyn DataStore>,
    questions: Arc<dyn ResourceHandler>,
    deadline: Duration,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let coordinator = Arc::new(ShutdownCoordinator::new(store.clone(), deadline));
    let server = HttpServer::new(config, store, questions).unwrap();
    let handle = tokio::spawn(server.run(listener, coordinator.clone()));

    TestServer {
        addr,
        coordinator,
        handle,
    }
}

/// Client that keeps cookies between requests.
pub fn cookie_client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

pub fn sample_question(number: i64, category: &str) -> Value {
    json!({
        "question": format!("Question {}?", number),
        "answer": "42",
        "category": category,
        "context": "Trivia",
        "questionNumber": number,
    })
}
