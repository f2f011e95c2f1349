use chrono::{Local, SecondsFormat};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::ActualResponse;
use crate::request::ExecutedRequest;
use crate::test_case::{Expect, Request, TestCase, TestInfo};
use crate::verify::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassFail {
    Pass,
    Fail,
}

/// Everything known about one finished test case. Never modified once built.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub pass_fail: PassFail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_fail_reason: Option<String>,
    pub timestamp: String,
    pub test_info: TestInfo,
    pub request: Request,
    pub expect: Expect,
    pub actual: ActualResponse,
}

impl TestResult {
    pub fn new(
        case: &TestCase,
        request: ExecutedRequest,
        actual: ActualResponse,
        verdict: Verdict,
    ) -> Self {
        let (pass_fail, pass_fail_reason) = match verdict {
            Verdict::Pass => (PassFail::Pass, None),
            Verdict::Fail(reason) => (PassFail::Fail, Some(reason)),
        };

        Self {
            pass_fail,
            pass_fail_reason,
            timestamp: timestamp(),
            test_info: case.test_info.clone(),
            request: request.declared,
            expect: case.expect.clone(),
            actual,
        }
    }

    pub fn passed(&self) -> bool {
        self.pass_fail == PassFail::Pass
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Render)
    }
}

/// Written in place of a [`TestResult`] when a test case hit a hard error.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub source: String,
    pub error: String,
    pub timestamp: String,
}

impl ErrorReport {
    pub fn new(source: &str, error: &Error) -> Self {
        Self {
            source: source.to_string(),
            error: error.to_string(),
            timestamp: timestamp(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Render)
    }
}

/// Local time, RFC 3339 with an explicit offset.
pub fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}
