//! The test case pipeline (load, build, execute, verify, report) and the
//! batch runner that fans it out under a concurrency ceiling.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::execute;
use crate::report::{ErrorReport, TestResult};
use crate::request::build_request;
use crate::test_case::TestCase;
use crate::verify::verify;

/// Where a test case comes from.
#[async_trait]
pub trait TestSource: Send + Sync {
    /// Label used in logs and in error reports.
    fn name(&self) -> String;

    async fn load(&self) -> Result<TestCase>;
}

/// Where finished records go. Called exactly once per test case.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, record: &Record) -> Result<()>;
}

/// The outcome of one pipeline: a result, or the hard error that stopped it.
#[derive(Debug)]
pub struct Record {
    pub source: String,
    pub outcome: Result<TestResult>,
}

impl Record {
    pub fn render(&self) -> Result<String> {
        match &self.outcome {
            Ok(result) => result.to_json_pretty(),
            Err(err) => ErrorReport::new(&self.source, err).to_json_pretty(),
        }
    }
}

pub async fn run_test_case(config: &Config, case: &TestCase) -> Result<TestResult> {
    let request = build_request(config, &case.request)?;
    let actual = execute(&request).await?;
    let verdict = verify(&case.expect, &actual)?;

    log::info!(
        "[{}] {} {} -> {}",
        case.test_info.id,
        request.verb,
        request.url,
        verdict
    );

    Ok(TestResult::new(case, request, actual, verdict))
}

/// Raw test case JSON in, pretty-printed result JSON out.
pub async fn run_document(config: &Config, document: &[u8]) -> Result<String> {
    let case = TestCase::from_slice(document)?;
    run_test_case(config, &case).await?.to_json_pretty()
}

async fn run_source(config: &Config, source: &dyn TestSource) -> Result<TestResult> {
    let case = source.load().await?;
    run_test_case(config, &case).await
}

/// Runs every source, at most `config.max_concurrent` at a time, and waits
/// for all of them. One record per source, in submission order.
///
/// A hard error or a panic in one pipeline is recorded for that source only.
pub async fn run_batch(
    config: Arc<Config>,
    sources: Vec<Arc<dyn TestSource>>,
    sink: Arc<dyn ResultSink>,
) -> Vec<Record> {
    let ceiling = config.max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
    let permits = Arc::new(Semaphore::new(ceiling));
    log::info!(
        "running {} test cases, max concurrency {ceiling}",
        sources.len()
    );

    let (names, handles): (Vec<_>, Vec<_>) = sources
        .into_iter()
        .map(|source| {
            let config = Arc::clone(&config);
            let sink = Arc::clone(&sink);
            let permits = Arc::clone(&permits);
            let name = source.name();

            // Set once the task has handed its record to the sink.
            let persisted = Arc::new(AtomicBool::new(false));
            let handed_off = Arc::clone(&persisted);

            let handle = tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();

                let name = source.name();
                log::debug!("running test case from {name}");
                let outcome = run_source(&config, source.as_ref()).await;
                if let Err(err) = &outcome {
                    log::error!("{name}: {err}");
                }

                let record = Record {
                    source: name,
                    outcome,
                };
                handed_off.store(true, Ordering::SeqCst);
                persist(sink.as_ref(), &record).await;
                record
            });

            ((name, persisted), handle)
        })
        .unzip();

    let mut records = Vec::with_capacity(handles.len());
    for ((name, persisted), joined) in names.into_iter().zip(join_all(handles).await) {
        let record = match joined {
            Ok(record) => record,
            Err(err) => {
                log::error!("{name}: {err}");
                let message = err.to_string();
                if !persisted.load(Ordering::SeqCst) {
                    persist_isolated(&sink, &name, &message).await;
                }
                Record {
                    source: name,
                    outcome: Err(Error::Panicked(message)),
                }
            }
        };
        records.push(record);
    }

    records
}

/// Persists the record of a pipeline that panicked, on a task of its own so
/// a sink that panics again cannot take the batch down.
async fn persist_isolated(sink: &Arc<dyn ResultSink>, name: &str, message: &str) {
    let sink = Arc::clone(sink);
    let record = Record {
        source: name.to_string(),
        outcome: Err(Error::Panicked(message.to_string())),
    };
    if let Err(err) = tokio::spawn(async move { persist(sink.as_ref(), &record).await }).await {
        log::error!("{name}: {err}");
    }
}

async fn persist(sink: &dyn ResultSink, record: &Record) {
    if let Err(err) = sink.persist(record).await {
        log::error!("{}: {err}", record.source);
    }
}

/// A test case stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TestSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<TestCase> {
        let file = tokio::fs::File::open(&self.path).await.map_err(Error::Read)?;
        TestCase::from_reader(file).await
    }
}

/// Writes each record next to its source as `<source>.result.json`.
#[derive(Debug, Clone, Default)]
pub struct FileSink;

impl FileSink {
    pub fn result_path(source: &str) -> PathBuf {
        PathBuf::from(format!("{source}.result.json"))
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn persist(&self, record: &Record) -> Result<()> {
        let mut rendered = record.render()?;
        rendered.push('\n');
        tokio::fs::write(Self::result_path(&record.source), rendered)
            .await
            .map_err(Error::Persist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_document_is_a_hard_error() {
        let config = Config::new("http://127.0.0.1:1");
        let err = run_document(&config, b"{ not json").await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn invalid_verb_stops_before_any_io() {
        let config = Config::new("http://127.0.0.1:1");
        let err = run_document(&config, br#"{"request": {"verb": "BREW", "url": "/pot"}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVerb(_)));
    }

    #[tokio::test]
    async fn unbounded_ceiling_does_not_overflow_the_semaphore() {
        let config = Config {
            max_concurrent: usize::MAX,
            ..Config::new("http://127.0.0.1:1")
        };
        let records = run_batch(Arc::new(config), Vec::new(), Arc::new(FileSink)).await;
        assert!(records.is_empty());
    }

    #[test]
    fn result_file_sits_next_to_its_source() {
        assert_eq!(
            FileSink::result_path("cases/login.json"),
            PathBuf::from("cases/login.json.result.json")
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let source = FileSource::new("/definitely/not/here.json");
        assert!(matches!(source.load().await.unwrap_err(), Error::Read(_)));
    }
}
