//! Declarative request validation.
//!
//! A route declares a list of [`FieldRule`]s. [`validate`] evaluates every
//! rule against the request and returns all failures at once, so a client
//! fixes its input in a single round trip.
//!
//! Within one field, checks run in declaration order and stop at the first
//! failure: a missing or mistyped value says nothing useful about its
//! format. Fields never affect each other.

pub mod rules;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{ApiError, FieldError};
use crate::routing::matcher::PathParams;

/// Where a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Body,
    Param,
    Query,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Body => "body",
            Location::Param => "params",
            Location::Query => "query",
        })
    }
}

/// A single constraint on a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Required,
    String,
    NonEmpty,
    Integer,
    ObjectId,
    Email,
    MaxLength(usize),
}

/// Constraints attached to one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field: String,
    location: Location,
    checks: Vec<Check>,
    optional: bool,
    message: Option<String>,
}

impl FieldRule {
    fn new(field: impl Into<String>, location: Location) -> Self {
        Self {
            field: field.into(),
            location,
            checks: Vec::new(),
            optional: false,
            message: None,
        }
    }

    pub fn body(field: impl Into<String>) -> Self {
        Self::new(field, Location::Body)
    }

    pub fn param(field: impl Into<String>) -> Self {
        Self::new(field, Location::Param)
    }

    pub fn query(field: impl Into<String>) -> Self {
        Self::new(field, Location::Query)
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn required(self) -> Self {
        self.check(Check::Required)
    }

    pub fn string(self) -> Self {
        self.check(Check::String)
    }

    pub fn non_empty(self) -> Self {
        self.check(Check::NonEmpty)
    }

    pub fn integer(self) -> Self {
        self.check(Check::Integer)
    }

    pub fn object_id(self) -> Self {
        self.check(Check::ObjectId)
    }

    pub fn email(self) -> Self {
        self.check(Check::Email)
    }

    pub fn max_length(self, max: usize) -> Self {
        self.check(Check::MaxLength(max))
    }

    /// Skip every check when the value is absent.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Replace the message of any failure on this field.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub location: Location,
    pub message: String,
}

/// Ordered failures; empty means accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Convert into the 400 `ERR_VALIDATION` error when anything failed.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.violations.is_empty() {
            return Ok(());
        }
        let details = self
            .violations
            .into_iter()
            .map(|v| FieldError::new(v.field, v.message))
            .collect();
        Err(ApiError::validation(details))
    }
}

/// The parts of a request rules can inspect.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub body: &'a Value,
    pub params: &'a PathParams,
    pub query: &'a HashMap<String, String>,
}

impl ValidationInput<'_> {
    fn lookup(&self, rule: &FieldRule) -> Option<Value> {
        match rule.location {
            Location::Body => self.body.get(&rule.field).filter(|v| !v.is_null()).cloned(),
            Location::Param => self.params.get(&rule.field).cloned().map(Value::String),
            Location::Query => self.query.get(&rule.field).cloned().map(Value::String),
        }
    }
}

/// Evaluate every rule and collect all failures in rule order.
pub fn validate(rules: &[FieldRule], input: &ValidationInput<'_>) -> ValidationResult {
    let violations = rules
        .iter()
        .filter_map(|rule| {
            check_field(rule, input.lookup(rule).as_ref()).map(|message| Violation {
                field: rule.field.clone(),
                location: rule.location,
                message: rule.message.clone().unwrap_or(message),
            })
        })
        .collect();

    ValidationResult { violations }
}

/// Turn numeric text into numbers for body fields declared as integers.
///
/// Form bodies carry every value as a string; JSON bodies are left alone.
pub fn coerce_form_integers(rules: &[FieldRule], body: &mut Value) {
    let Value::Object(map) = body else {
        return;
    };
    let integer_fields = rules
        .iter()
        .filter(|rule| rule.location == Location::Body && rule.checks.contains(&Check::Integer));

    for rule in integer_fields {
        let parsed = map
            .get(&rule.field)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<i64>().ok());
        if let Some(n) = parsed {
            map.insert(rule.field.clone(), Value::from(n));
        }
    }
}

fn check_field(rule: &FieldRule, value: Option<&Value>) -> Option<String> {
    let field = &rule.field;

    let Some(value) = value else {
        let required = !rule.optional && rule.checks.contains(&Check::Required);
        return required.then(|| format!("{} is required", field));
    };

    // Path and query values are always strings; numbers arrive as text.
    let textual = rule.location != Location::Body;

    rule.checks.iter().find_map(|check| match check {
        Check::Required => None,
        Check::String => (!value.is_string()).then(|| format!("{} must be a string", field)),
        Check::NonEmpty => match value.as_str() {
            Some(s) if s.trim().is_empty() => Some(format!("{} is required", field)),
            _ => None,
        },
        Check::Integer => {
            let ok = match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) if textual => s.trim().parse::<i64>().is_ok(),
                _ => false,
            };
            (!ok).then(|| format!("{} must be an integer", field))
        }
        Check::ObjectId => {
            let ok = value.as_str().is_some_and(is_object_id);
            (!ok).then(|| "Invalid ID format".to_string())
        }
        Check::Email => {
            let ok = value.as_str().is_some_and(is_email);
            (!ok).then(|| "Must be a valid email".to_string())
        }
        Check::MaxLength(max) => match value.as_str() {
            Some(s) if s.chars().count() > *max => {
                Some(format!("{} must be at most {} characters", field, max))
            }
            _ => None,
        },
    })
}

/// 24 hexadecimal characters.
pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Deliberately loose: `local@domain.tld`, no whitespace.
pub fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(rules: &[FieldRule], body: Value) -> ValidationResult {
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
    }

    #[test]
    fn test_reports_every_failing_field_in_order() {
        let rules = [
            FieldRule::body("question").required().string(),
            FieldRule::body("answer").required().string(),
        ];

        let result = run(&rules, json!({}));
        let fields: Vec<_> = result.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, ["question", "answer"]);
        assert_eq!(result.violations()[0].message, "question is required");
    }

    #[test]
    fn test_first_failure_per_field_wins() {
        let rules = [FieldRule::body("name").required().string().non_empty().max_length(3)];

        let result = run(&rules, json!({ "name": 42 }));
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].message, "name must be a string");
    }

    #[test]
    fn test_optional_field_skips_when_absent() {
        let rules = [FieldRule::body("category").optional().string()];

        assert!(run(&rules, json!({})).is_ok());
        assert!(run(&rules, json!({ "category": null })).is_ok());
        assert!(!run(&rules, json!({ "category": 3 })).is_ok());
    }

    #[test]
    fn test_blank_string_is_empty() {
        let rules = [FieldRule::body("answer").required().string().non_empty()];
        let result = run(&rules, json!({ "answer": "   " }));
        assert_eq!(result.violations()[0].message, "answer is required");
    }

    #[test]
    fn test_integer_check() {
        let rules = [FieldRule::body("n").required().integer()];
        assert!(run(&rules, json!({ "n": 7 })).is_ok());
        assert!(!run(&rules, json!({ "n": 7.5 })).is_ok());
        assert!(!run(&rules, json!({ "n": "7" })).is_ok());
    }

    #[test]
    fn test_form_integers_are_coerced() {
        let rules = [
            FieldRule::body("questionNumber").required().integer(),
            FieldRule::body("answer").required().string(),
        ];
        let mut body = json!({ "questionNumber": "7", "answer": "42" });

        coerce_form_integers(&rules, &mut body);
        assert_eq!(body, json!({ "questionNumber": 7, "answer": "42" }));
        assert!(run(&rules, body).is_ok());

        let mut body = json!({ "questionNumber": "seven" });
        coerce_form_integers(&rules, &mut body);
        assert_eq!(body["questionNumber"], "seven");
    }

    #[test]
    fn test_param_and_query_locations() {
        let rules = [
            FieldRule::param("id").object_id(),
            FieldRule::query("page").optional().integer(),
        ];
        let body = Value::Null;
        let mut params = PathParams::new();
        params.insert("id".into(), "not-an-id".into());
        let mut query = HashMap::new();
        query.insert("page".into(), "2".into());

        let result = validate(
            &rules,
            &ValidationInput {
                body: &body,
                params: &params,
                query: &query,
            },
        );
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.violations()[0].location, Location::Param);
        assert_eq!(result.violations()[0].message, "Invalid ID format");
    }

    #[test]
    fn test_message_override() {
        let rules = [FieldRule::body("title").required().with_message("Give it a title")];
        let result = run(&rules, json!({}));
        assert_eq!(result.violations()[0].message, "Give it a title");
    }

    #[test]
    fn test_into_result_builds_validation_error() {
        let rules = [FieldRule::body("a").required(), FieldRule::body("b").required()];
        let err = run(&rules, json!({})).into_result().unwrap_err();

        assert_eq!(err.code(), "ERR_VALIDATION");
        let details = err.details().unwrap();
        assert_eq!(details.as_array().unwrap().len(), 2);
        assert_eq!(details[1]["message"], "b is required");
    }

    #[test]
    fn test_email_check() {
        let rules = [FieldRule::body("contact").optional().email()];
        assert!(run(&rules, json!({ "contact": "quiz@cquizy.com" })).is_ok());
        let result = run(&rules, json!({ "contact": "nope" }));
        assert_eq!(result.violations()[0].field, "contact");
    }

    #[test]
    fn test_formats() {
        assert!(is_object_id("64b7f0c2a1b2c3d4e5f60718"));
        assert!(!is_object_id("64b7f0c2a1b2c3d4e5f6071"));
        assert!(!is_object_id("zzb7f0c2a1b2c3d4e5f60718"));

        assert!(is_email("quiz@cquizy.com"));
        assert!(!is_email("quiz@localhost"));
        assert!(!is_email("@cquizy.com"));
        assert!(!is_email("a b@cquizy.com"));
    }
}
