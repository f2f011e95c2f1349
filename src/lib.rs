//! Runs declarative HTTP test cases: a JSON document describes a request and
//! the response it should get back. The request is sent to the target, the
//! response is judged with one of several verification strategies, and a JSON
//! result is produced for every case.

pub mod config;
pub mod error;
pub mod executor;
pub mod report;
pub mod request;
pub mod runner;
pub mod test_case;
pub mod verify;

pub use config::Config;
pub use error::{Error, Result};
pub use executor::ActualResponse;
pub use report::{PassFail, TestResult};
pub use request::{ExecutedRequest, Verb};
pub use runner::{run_batch, run_document, run_test_case, Record, ResultSink, TestSource};
pub use test_case::TestCase;
pub use verify::{Strategy, Verdict};
