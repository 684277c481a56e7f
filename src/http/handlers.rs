//! API operations dispatched after the pipeline stages pass.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::http::response::Reply;
use crate::pipeline::{RequestContext, RequestHandler};
use crate::resources::ResourceHandler;
use crate::routing::Operation;
use crate::security::csrf::CsrfGuard;

pub const WELCOME_MESSAGE: &str = "Welcome to the CQuizy API";

/// Maps each [`Operation`] onto the resource layer.
pub struct ApiHandlers {
    questions: Arc<dyn ResourceHandler>,
    csrf: Arc<CsrfGuard>,
}

impl ApiHandlers {
    pub fn new(questions: Arc<dyn ResourceHandler>, csrf: Arc<CsrfGuard>) -> Self {
        Self { questions, csrf }
    }

    fn id(ctx: &RequestContext) -> Result<String, ApiError> {
        ctx.params
            .get("id")
            .cloned()
            .ok_or_else(|| ApiError::internal("route matched without an :id parameter"))
    }

    fn issue_csrf_token(&self, ctx: &mut RequestContext) -> Result<Reply, ApiError> {
        let session = ctx
            .session
            .as_mut()
            .ok_or_else(|| ApiError::internal("session stage did not run"))?;
        let token = self.csrf.issue_token(session);
        Ok(Reply::ok(json!({ "csrfToken": token })))
    }
}

fn success(data: Value) -> Value {
    json!({ "status": "success", "data": data })
}

impl RequestHandler for ApiHandlers {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Reply, ApiError>> {
        Box::pin(async move {
            let operation = ctx
                .route
                .as_ref()
                .map(|route| route.operation)
                .ok_or_else(|| ApiError::internal("handler reached without a route"))?;

            match operation {
                Operation::Welcome => Ok(Reply::text(WELCOME_MESSAGE)),
                Operation::CsrfToken => self.issue_csrf_token(ctx),
                Operation::ListQuestions => {
                    let questions = self.questions.list(&ctx.query).await?;
                    Ok(Reply::ok(json!({
                        "status": "success",
                        "results": questions.len(),
                        "data": questions,
                    })))
                }
                Operation::GetQuestion => {
                    let id = Self::id(ctx)?;
                    let question = self.questions.get(&id).await?;
                    Ok(Reply::ok(success(question)))
                }
                Operation::CreateQuestion => {
                    let body = std::mem::take(&mut ctx.body);
                    let question = self.questions.create(body).await?;
                    Ok(Reply::created(success(question)))
                }
                Operation::UpdateQuestion => {
                    let id = Self::id(ctx)?;
                    let body = std::mem::take(&mut ctx.body);
                    let question = self.questions.update(&id, body).await?;
                    Ok(Reply::ok(success(question)))
                }
                Operation::DeleteQuestion => {
                    let id = Self::id(ctx)?;
                    let question = self.questions.delete(&id).await?;
                    Ok(Reply::ok(json!({
                        "status": "success",
                        "message": "Question deleted",
                        "data": question,
                    })))
                }
            }
        })
    }
}
