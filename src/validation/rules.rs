//! Shared rule sets for the question API.

use super::FieldRule;

const TEXT_FIELDS: [&str; 4] = ["question", "answer", "category", "context"];

/// Longest accepted category filter.
pub const MAX_CATEGORY_LEN: usize = 100;

/// Full question document, every field required.
pub fn question_body() -> Vec<FieldRule> {
    TEXT_FIELDS
        .iter()
        .map(|field| FieldRule::body(*field).required().string().non_empty())
        .chain([FieldRule::body("questionNumber").required().integer()])
        .collect()
}

/// Partial update: any subset of the question fields, each well-typed.
pub fn question_patch() -> Vec<FieldRule> {
    TEXT_FIELDS
        .iter()
        .map(|field| FieldRule::body(*field).optional().string().non_empty())
        .chain([FieldRule::body("questionNumber").optional().integer()])
        .collect()
}

/// `:id` path parameter shaped like a document id.
pub fn id_param() -> FieldRule {
    FieldRule::param("id").required().object_id().with_message("Invalid ID format")
}

/// Optional `?category=` filter.
pub fn category_query() -> FieldRule {
    FieldRule::query("category").optional().non_empty().max_length(MAX_CATEGORY_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::matcher::PathParams;
    use crate::validation::{validate, ValidationInput};
    use serde_json::json;
    use std::collections::HashMap;

    fn check(rules: &[FieldRule], body: serde_json::Value) -> Vec<String> {
        let params = PathParams::new();
        let query = HashMap::new();
        validate(
            rules,
            &ValidationInput {
                body: &body,
                params: &params,
                query: &query,
            },
        )
        .violations()
        .iter()
        .map(|v| v.field.clone())
        .collect()
    }

    #[test]
    fn test_empty_question_reports_all_fields() {
        let fields = check(&question_body(), json!({}));
        assert_eq!(
            fields,
            ["question", "answer", "category", "context", "questionNumber"]
        );
    }

    #[test]
    fn test_complete_question_passes() {
        let body = json!({
            "question": "What is the capital of France?",
            "answer": "Paris",
            "category": "geography",
            "context": "Europe",
            "questionNumber": 1
        });
        assert!(check(&question_body(), body).is_empty());
    }

    #[test]
    fn test_patch_accepts_subset() {
        assert!(check(&question_patch(), json!({ "answer": "Lyon" })).is_empty());
        assert_eq!(check(&question_patch(), json!({ "questionNumber": "one" })), ["questionNumber"]);
    }
}
