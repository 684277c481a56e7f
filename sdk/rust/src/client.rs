//! Client for the quiz API.
//!
//! Keeps the session cookie in a cookie store and echoes the CSRF token
//! on every state-changing request.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
        details: Option<Value>,
    },
    #[error("No CSRF token; call fetch_csrf_token first")]
    MissingCsrfToken,
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    error: EnvelopeError,
}

#[derive(Deserialize)]
struct EnvelopeError {
    message: String,
    code: Option<String>,
    details: Option<Value>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

#[derive(Deserialize)]
struct DataResponse {
    data: Value,
}

#[derive(Deserialize)]
struct ListResponse {
    data: Vec<Value>,
}

pub struct QuizClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    csrf_token: Option<String>,
}

impl QuizClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: "/api".to_string(),
            csrf_token: None,
        })
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Use `token` for subsequent mutations instead of a fetched one.
    pub fn set_csrf_token(&mut self, token: impl Into<String>) {
        self.csrf_token = Some(token.into());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    fn mutation(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.csrf_token.as_deref().ok_or(ClientError::MissingCsrfToken)?;
        Ok(self
            .client
            .request(method, self.url(path))
            .header(CSRF_HEADER, token))
    }

    /// Establish a session and fetch its CSRF token.
    pub async fn fetch_csrf_token(&mut self) -> Result<String, ClientError> {
        let resp = self.client.get(self.url("/csrf-token")).send().await?;
        let body: TokenResponse = parse(resp).await?;
        self.csrf_token = Some(body.csrf_token.clone());
        Ok(body.csrf_token)
    }

    pub async fn list_questions(&self, category: Option<&str>) -> Result<Vec<Value>, ClientError> {
        let mut req = self.client.get(self.url("/questions"));
        if let Some(category) = category {
            req = req.query(&[("category", category)]);
        }
        let body: ListResponse = parse(req.send().await?).await?;
        Ok(body.data)
    }

    pub async fn get_question(&self, id: &str) -> Result<Value, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/questions/{}", id)))
            .send()
            .await?;
        let body: DataResponse = parse(resp).await?;
        Ok(body.data)
    }

    pub async fn create_question(&self, question: &Value) -> Result<Value, ClientError> {
        let resp = self
            .mutation(Method::POST, "/questions")?
            .json(question)
            .send()
            .await?;
        let body: DataResponse = parse(resp).await?;
        Ok(body.data)
    }

    pub async fn update_question(&self, id: &str, patch: &Value) -> Result<Value, ClientError> {
        let resp = self
            .mutation(Method::PUT, &format!("/questions/{}", id))?
            .json(patch)
            .send()
            .await?;
        let body: DataResponse = parse(resp).await?;
        Ok(body.data)
    }

    pub async fn delete_question(&self, id: &str) -> Result<Value, ClientError> {
        let resp = self
            .mutation(Method::DELETE, &format!("/questions/{}", id))?
            .send()
            .await?;
        let body: DataResponse = parse(resp).await?;
        Ok(body.data)
    }

    /// Health report; returned for both UP (200) and DOWN (503).
    pub async fn health(&self) -> Result<(StatusCode, Value), ClientError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let status = resp.status();
        Ok((status, resp.json().await?))
    }
}

async fn parse<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await?;
    Err(match serde_json::from_str::<Envelope>(&text) {
        Ok(envelope) => ClientError::Api {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
            details: envelope.error.details,
        },
        Err(_) => ClientError::Api {
            status,
            code: None,
            message: text,
            details: None,
        },
    })
}
