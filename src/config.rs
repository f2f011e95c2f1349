use tokio::sync::Semaphore;

/// Process-wide settings, built once at startup and handed to the runner.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Prefix placed verbatim in front of every test case's `request.url`.
    pub base_url: String,
    /// Upper bound on pipelines running at the same time. Always at least 1
    /// and at most [`Semaphore::MAX_PERMITS`].
    pub max_concurrent: usize,
    pub debug: bool,
    /// Glob pattern selecting test case files for batch mode.
    pub test_cases: Option<String>,
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_concurrent: 1,
            debug: false,
            test_cases: None,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_test_cases(mut self, pattern: Option<String>) -> Self {
        self.test_cases = pattern.filter(|p| !p.is_empty());
        self
    }

    /// Absent, unparsable and zero values all mean sequential execution.
    pub fn parse_concurrency(raw: Option<&str>) -> usize {
        raw.and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .map_or(1, |n| n.min(Semaphore::MAX_PERMITS))
    }
}
