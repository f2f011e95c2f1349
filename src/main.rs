use std::sync::Arc;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use http_api_tester::runner::{run_batch, run_document, FileSink, FileSource, TestSource};
use http_api_tester::Config;
use log::LevelFilter;
use tokio::io::AsyncReadExt;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Runs HTTP test cases described as JSON documents.
///
/// Without a test case pattern a single test case is read from stdin and its
/// result is printed to stdout.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Server under test, e.g. http://localhost:8000
    #[arg(long, env = "APP", default_value = "")]
    app: String,

    /// Glob selecting test case files, e.g. "tests/test*.json"
    #[arg(long, env = "TESTCASES")]
    test_cases: Option<String>,

    /// How many test cases may run at once
    #[arg(long, env = "MAX_CONCURRENT")]
    max_concurrent: Option<String>,

    /// Debug logging. Any value other than "", 0, false, no or off enables it
    #[arg(long, env = "DEBUG", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config::new(self.app)
            .with_max_concurrent(Config::parse_concurrency(self.max_concurrent.as_deref()))
            .with_debug(self.debug)
            .with_test_cases(self.test_cases)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Cli::parse().into_config());

    let level = if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    pretty_env_logger::formatted_builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    match config.test_cases.clone() {
        Some(pattern) => run_files(config, &pattern).await,
        None => run_stdin(&config).await,
    }
}

async fn run_files(config: Arc<Config>, pattern: &str) -> Result<()> {
    let mut sources: Vec<Arc<dyn TestSource>> = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.to_string_lossy().ends_with(".result.json") => {}
            Ok(path) => sources.push(Arc::new(FileSource::new(path))),
            Err(err) => log::warn!("skipping {}: {err}", err.path().display()),
        }
    }

    let records = run_batch(config, sources, Arc::new(FileSink)).await;

    let passed = records
        .iter()
        .filter(|r| matches!(&r.outcome, Ok(result) if result.passed()))
        .count();
    let errored = records.iter().filter(|r| r.outcome.is_err()).count();
    log::info!(
        "{} test cases: {passed} passed, {} failed, {errored} errored",
        records.len(),
        records.len() - passed - errored
    );

    Ok(())
}

async fn run_stdin(config: &Config) -> Result<()> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;

    match run_document(config, &input).await {
        Ok(result) => {
            println!("{result}");
            Ok(())
        }
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
}
