//! Judging an [`ActualResponse`] against a test case's [`Expect`] block.
//!
//! Status code and latency are checked first for every strategy and stop
//! evaluation on the first violation. The body is then compared with the
//! strategy named by `expect.parse_as`:
//!
//! * `regex`: every expected key is a pattern that must match the actual
//!   value at the same key
//! * `exact_match`: the actual body is structurally equal to the expected body
//! * `partial_match`: the expected body is contained in the actual body
//! * `json_schema`: the expected body is a schema the actual body must satisfy
//!
//! A missing (`null`) expected body skips the body comparison.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use assert_json_diff::{assert_json_matches_no_panic, CompareMode};
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::executor::ActualResponse;
use crate::test_case::Expect;

pub const NO_STRATEGY: &str = "no verification strategy declared";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Undeclared,
    Regex,
    ExactMatch,
    PartialMatch,
    JsonSchema,
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Strategy::Undeclared),
            "regex" => Ok(Strategy::Regex),
            "exact_match" => Ok(Strategy::ExactMatch),
            "partial_match" => Ok(Strategy::PartialMatch),
            "json_schema" => Ok(Strategy::JsonSchema),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// Outcome of a verification that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(reason) => Some(reason.as_str()),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail(reason) => write!(f, "fail ({reason})"),
        }
    }
}

pub fn verify(expect: &Expect, actual: &ActualResponse) -> Result<Verdict> {
    if expect.http_code != 0 && expect.http_code != actual.http_code {
        return Ok(Verdict::Fail(format!(
            "actual.http_code doesn't match expect.http_code, expected {}, got {}",
            expect.http_code, actual.http_code
        )));
    }

    if expect.max_latency_ms != 0 && actual.latency_ms > expect.max_latency_ms {
        return Ok(Verdict::Fail(format!(
            "actual.latency_ms ({}) > expect.max_latency_ms ({})",
            actual.latency_ms, expect.max_latency_ms
        )));
    }

    match expect.parse_as.parse::<Strategy>()? {
        Strategy::Undeclared => Ok(Verdict::Fail(NO_STRATEGY.to_string())),
        Strategy::Regex => regex_match(&expect.body, &actual.body),
        Strategy::ExactMatch => Ok(exact_match(&expect.body, &actual.body)),
        Strategy::PartialMatch => Ok(partial_match(&expect.body, &actual.body)),
        Strategy::JsonSchema => schema_match(&expect.body, &actual.body),
    }
}

fn regex_match(expected: &Value, actual: &Value) -> Result<Verdict> {
    let patterns = match expected {
        Value::Null => return Ok(Verdict::Pass),
        Value::Object(patterns) => patterns,
        other => {
            return Err(Error::InvalidExpectation(format!(
                "regex expect.body must be an object of patterns, got {other}"
            )))
        }
    };

    // Compile everything up front so a bad pattern is always reported.
    let mut compiled = Vec::with_capacity(patterns.len());
    for (field, pattern) in patterns {
        let Value::String(pattern) = pattern else {
            return Err(Error::InvalidExpectation(format!(
                "expect.body.{field} must be a string pattern, got {pattern}"
            )));
        };
        let re = Regex::new(pattern).map_err(|source| Error::Regex {
            field: field.clone(),
            source,
        })?;
        compiled.push((field, re));
    }

    let Value::Object(fields) = actual else {
        return Ok(Verdict::Fail(format!(
            "actual.body is not a JSON object, got {actual}"
        )));
    };

    for (field, re) in compiled {
        let Some(value) = fields.get(field) else {
            return Ok(Verdict::Fail(format!(
                "expect.body.{field} is missing from actual.body"
            )));
        };

        let text = stringify(value);
        log::debug!("expect.body.{field} /{re}/ against {text:?}");

        if !re.is_match(&text) {
            return Ok(Verdict::Fail(format!(
                "actual.body.{field} ({text}) doesn't match expect.body.{field} (/{re}/)"
            )));
        }
    }

    Ok(Verdict::Pass)
}

/// Text a regex is matched against. Floats use six decimals.
fn stringify(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Number(n) if n.is_f64() => {
            Cow::Owned(format!("{:.6}", n.as_f64().unwrap_or_default()))
        }
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Null => Cow::Borrowed("null"),
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

fn exact_match(expected: &Value, actual: &Value) -> Verdict {
    if expected.is_null() {
        return Verdict::Pass;
    }

    let config = assert_json_diff::Config::new(CompareMode::Strict);
    match assert_json_matches_no_panic(actual, expected, config) {
        Ok(()) => Verdict::Pass,
        Err(diff) => Verdict::Fail(format!("expect.body is not equal to actual.body\n{diff}")),
    }
}

fn partial_match(expected: &Value, actual: &Value) -> Verdict {
    if expected.is_null() {
        return Verdict::Pass;
    }

    match find_mismatch(expected, actual, "body") {
        None => Verdict::Pass,
        Some(mismatch) => Verdict::Fail(format!(
            "expect.body is not a subset of actual.body: {mismatch}"
        )),
    }
}

/// Objects may carry extra keys at any depth. Arrays must have the same
/// length, each element contained in its counterpart. Scalars must be equal.
fn find_mismatch(expected: &Value, actual: &Value, path: &str) -> Option<String> {
    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            expected.iter().find_map(|(key, value)| {
                let path = format!("{path}.{key}");
                match actual.get(key) {
                    Some(found) => find_mismatch(value, found, &path),
                    None => Some(format!("{path} is missing")),
                }
            })
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return Some(format!(
                    "{path} has {} elements, expected {}",
                    actual.len(),
                    expected.len()
                ));
            }
            expected
                .iter()
                .zip(actual)
                .enumerate()
                .find_map(|(i, (e, a))| find_mismatch(e, a, &format!("{path}[{i}]")))
        }
        (expected, actual) if expected == actual => None,
        (expected, actual) => Some(format!("{path} is {actual}, expected {expected}")),
    }
}

fn schema_match(schema: &Value, actual: &Value) -> Result<Verdict> {
    if schema.is_null() {
        return Ok(Verdict::Pass);
    }

    let validator =
        jsonschema::validator_for(schema).map_err(|err| Error::Schema(err.to_string()))?;

    let violations = validator
        .iter_errors(actual)
        .map(|err| format!("- {err}"))
        .collect::<Vec<_>>();

    if violations.is_empty() {
        return Ok(Verdict::Pass);
    }

    Ok(Verdict::Fail(format!(
        "JSON schema validation of response failed\n{}",
        violations.join("\n")
    )))
}
