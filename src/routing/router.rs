//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store the compiled route table
//! - Resolve a method and path to a route and its parameters
//! - Return an explicit no-match rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First match in declaration order wins
//! - `HEAD` resolves to the matching `GET` route

use std::sync::Arc;

use axum::http::Method;

use crate::routing::matcher::{PathParams, PathPattern};
use crate::validation::{rules, FieldRule};

/// What a matched route does. Dispatched by the API handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Welcome,
    CsrfToken,
    ListQuestions,
    GetQuestion,
    CreateQuestion,
    UpdateQuestion,
    DeleteQuestion,
}

/// One entry of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub operation: Operation,
    pub rules: Vec<FieldRule>,
}

/// A resolved route with its captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: PathParams,
}

/// Ordered, immutable route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route.
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        operation: Operation,
        rules: Vec<FieldRule>,
    ) -> Self {
        self.routes.push(Arc::new(Route {
            method,
            pattern: PathPattern::new(pattern),
            operation,
            rules,
        }));
        self
    }

    /// The quiz API mounted under `api_prefix`.
    pub fn quiz_api(api_prefix: &str) -> Self {
        let prefix = api_prefix.trim_end_matches('/');
        let questions = format!("{}/questions", prefix);
        let question = format!("{}/questions/:id", prefix);

        Self::new()
            .route(Method::GET, "/", Operation::Welcome, Vec::new())
            .route(
                Method::GET,
                &format!("{}/csrf-token", prefix),
                Operation::CsrfToken,
                Vec::new(),
            )
            .route(
                Method::GET,
                &questions,
                Operation::ListQuestions,
                vec![rules::category_query()],
            )
            .route(
                Method::POST,
                &questions,
                Operation::CreateQuestion,
                rules::question_body(),
            )
            .route(
                Method::GET,
                &question,
                Operation::GetQuestion,
                vec![rules::id_param()],
            )
            .route(Method::PUT, &question, Operation::UpdateQuestion, {
                let mut update_rules = rules::question_patch();
                update_rules.insert(0, rules::id_param());
                update_rules
            })
            .route(
                Method::DELETE,
                &question,
                Operation::DeleteQuestion,
                vec![rules::id_param()],
            )
    }

    /// Find the first route matching `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let wanted = if *method == Method::HEAD {
            Method::GET
        } else {
            method.clone()
        };

        self.routes
            .iter()
            .filter(|route| route.method == wanted)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch {
                        route: Arc::clone(route),
                        params,
                    })
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_api_resolution() {
        let table = RouteTable::quiz_api("/api");

        let cases = [
            (Method::GET, "/", Operation::Welcome),
            (Method::GET, "/api/csrf-token", Operation::CsrfToken),
            (Method::GET, "/api/questions", Operation::ListQuestions),
            (Method::POST, "/api/questions/", Operation::CreateQuestion),
            (Method::GET, "/api/questions/abc", Operation::GetQuestion),
            (Method::PUT, "/api/questions/abc", Operation::UpdateQuestion),
            (Method::DELETE, "/api/questions/abc", Operation::DeleteQuestion),
        ];

        for (method, path, operation) in cases {
            let matched = table.resolve(&method, path).unwrap();
            assert_eq!(matched.route.operation, operation, "{} {}", method, path);
        }
    }

    #[test]
    fn test_params_are_captured() {
        let table = RouteTable::quiz_api("/api");
        let matched = table.resolve(&Method::DELETE, "/api/questions/42").unwrap();
        assert_eq!(matched.params["id"], "42");
    }

    #[test]
    fn test_head_uses_get_route() {
        let table = RouteTable::quiz_api("/api");
        let matched = table.resolve(&Method::HEAD, "/api/questions").unwrap();
        assert_eq!(matched.route.operation, Operation::ListQuestions);
    }

    #[test]
    fn test_no_match() {
        let table = RouteTable::quiz_api("/api");
        assert!(table.resolve(&Method::GET, "/api/answers").is_none());
        assert!(table.resolve(&Method::PATCH, "/api/questions/1").is_none());
        assert!(table.resolve(&Method::POST, "/").is_none());
    }
}
