//! Matching observed provider responses against response expectations
//!
//! Used by provider builds to turn "call the endpoint, compare the
//! response" into a list of mismatches for a verification report.
//! Paths use JSONPath-like notation rooted at `$`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::contract::{BodyMatcher, Interaction, ResponseMatcher};

/// A response as actually returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, if any
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// One difference between expectation and observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Where the mismatch is (`status`, `header X`, or a body path)
    pub location: String,
    /// Expected value or shape
    pub expected: String,
    /// What was received
    pub actual: String,
}

impl Mismatch {
    fn new(location: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Mismatch {
            location: location.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected '{}' but received '{}'",
            self.location, self.expected, self.actual
        )
    }
}

impl Interaction {
    /// Compare an observed response with this interaction's expectation
    pub fn verify(&self, observed: &ObservedResponse) -> Vec<Mismatch> {
        match_response(&self.response, observed)
    }
}

/// Compare an observed response with a response expectation
///
/// Header names compare case-insensitively; extra observed headers and
/// extra object fields are allowed.
pub fn match_response(expected: &ResponseMatcher, observed: &ObservedResponse) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    if expected.status != observed.status {
        mismatches.push(Mismatch::new(
            "status",
            expected.status.to_string(),
            observed.status.to_string(),
        ));
    }

    for (name, value) in &expected.headers {
        let found = observed
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim());
        match found {
            Some(actual) if actual == value.trim() => {}
            Some(actual) => mismatches.push(Mismatch::new(format!("header {}", name), value.clone(), actual)),
            None => mismatches.push(Mismatch::new(format!("header {}", name), value.clone(), "nothing")),
        }
    }

    if let Some(body) = &expected.body {
        match &observed.body {
            Some(actual) => match_body(body, actual, "$", &mut mismatches),
            None => mismatches.push(Mismatch::new("body $", describe_matcher(body), "no body")),
        }
    }

    mismatches
}

/// Compare a JSON value against a body matcher, collecting every mismatch
pub fn match_body(matcher: &BodyMatcher, actual: &serde_json::Value, path: &str, out: &mut Vec<Mismatch>) {
    use serde_json::Value;

    match matcher {
        BodyMatcher::Equals { value } => {
            if value != actual {
                out.push(field(path, render(value), render(actual)));
            }
        }
        BodyMatcher::Like { value } => match_shape(value, actual, path, out),
        BodyMatcher::EachLike { template, min } => match actual {
            Value::Array(items) => {
                if items.len() < *min {
                    out.push(field(
                        path,
                        format!("at least {} element(s)", min),
                        format!("{} element(s)", items.len()),
                    ));
                }
                for (idx, item) in items.iter().enumerate() {
                    match_body(template, item, &format!("{}[{}]", path, idx), out);
                }
            }
            other => out.push(field(path, "array", type_name(other))),
        },
        BodyMatcher::Object { fields } => match actual {
            Value::Object(map) => {
                for (key, sub) in fields {
                    let child = format!("{}.{}", path, key);
                    match map.get(key) {
                        Some(v) => match_body(sub, v, &child, out),
                        None => out.push(field(&child, describe_matcher(sub), "nothing")),
                    }
                }
            }
            other => out.push(field(path, "object", type_name(other))),
        },
        BodyMatcher::Integer => {
            if !(actual.is_i64() || actual.is_u64()) {
                out.push(field(path, "integer", render(actual)));
            }
        }
        BodyMatcher::Decimal => {
            if !actual.is_f64() {
                out.push(field(path, "decimal", render(actual)));
            }
        }
        BodyMatcher::Boolean => {
            if !actual.is_boolean() {
                out.push(field(path, "boolean", render(actual)));
            }
        }
        BodyMatcher::String => {
            if !actual.is_string() {
                out.push(field(path, "string", render(actual)));
            }
        }
        BodyMatcher::Include { value } => match actual.as_str() {
            Some(s) if s.contains(value.as_str()) => {}
            _ => out.push(field(path, format!("string containing \"{}\"", value), render(actual))),
        },
        BodyMatcher::Null => {
            if !actual.is_null() {
                out.push(field(path, "null", render(actual)));
            }
        }
    }
}

/// Type-only comparison used by `like`
///
/// Objects require every example key; arrays require every element to
/// match the first example element.
fn match_shape(example: &serde_json::Value, actual: &serde_json::Value, path: &str, out: &mut Vec<Mismatch>) {
    use serde_json::Value;

    match (example, actual) {
        (Value::Object(expected), Value::Object(map)) => {
            for (key, sub) in expected {
                let child = format!("{}.{}", path, key);
                match map.get(key) {
                    Some(v) => match_shape(sub, v, &child, out),
                    None => out.push(field(&child, type_name(sub), "nothing")),
                }
            }
        }
        (Value::Array(expected), Value::Array(items)) => {
            if let Some(first) = expected.first() {
                for (idx, item) in items.iter().enumerate() {
                    match_shape(first, item, &format!("{}[{}]", path, idx), out);
                }
            }
        }
        (e, a) if type_name(e) == type_name(a) => {}
        (e, a) => out.push(field(path, type_name(e), type_name(a))),
    }
}

fn field(path: &str, expected: impl Into<String>, actual: impl Into<String>) -> Mismatch {
    Mismatch::new(format!("field {}", path), expected, actual)
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn describe_matcher(matcher: &BodyMatcher) -> String {
    match matcher {
        BodyMatcher::Equals { value } => render(value),
        BodyMatcher::Like { value } => type_name(value).to_string(),
        BodyMatcher::EachLike { .. } => "array".to_string(),
        BodyMatcher::Object { .. } => "object".to_string(),
        BodyMatcher::Integer => "integer".to_string(),
        BodyMatcher::Decimal => "decimal".to_string(),
        BodyMatcher::Boolean => "boolean".to_string(),
        BodyMatcher::String => "string".to_string(),
        BodyMatcher::Include { value } => format!("string containing \"{}\"", value),
        BodyMatcher::Null => "null".to_string(),
    }
}
