//! Test runner: registers suites, runs them in order and writes results

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{self, ArtifactRecord};
use crate::error::{E2eError, E2eResult};
use crate::suite::{CaseFilter, CaseStatus, HarnessContext, Planned, RunnableSuite, Suite, SuiteState};

/// Why a case (or a suite hook) failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Error kind, e.g. `assertion`, `timeout`, `transport`
    pub kind: String,
    /// Where it happened: `body`, `before_each`, `after_each`, ...
    pub phase: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl FailureRecord {
    pub fn from_error(error: &E2eError, phase: &str) -> Self {
        let (message, expected, actual) = match error {
            E2eError::Assertion(failure) => (
                failure.message.clone(),
                failure.expected.clone(),
                failure.actual.clone(),
            ),
            other => (other.to_string(), None, None),
        };
        Self {
            kind: error.kind().to_string(),
            phase: phase.to_string(),
            message,
            expected,
            actual,
        }
    }
}

/// Result of a single concrete case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub suite: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: i32,
    pub status: CaseStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRecord>,
}

impl CaseResult {
    pub(crate) fn skipped<S>(suite: &str, item: &Planned<'_, S>, reason: &str) -> Self {
        Self {
            suite: suite.to_string(),
            name: item.name.clone(),
            description: item.case.description.clone(),
            priority: item.case.priority,
            status: CaseStatus::Skipped,
            duration_ms: 0,
            failure: Some(FailureRecord {
                kind: "skipped".to_string(),
                phase: "plan".to_string(),
                message: reason.to_string(),
                expected: None,
                actual: None,
            }),
            artifacts: Vec::new(),
        }
    }

    pub(crate) fn finished<S>(
        suite: &str,
        item: &Planned<'_, S>,
        status: CaseStatus,
        elapsed: Duration,
        failure: Option<FailureRecord>,
        artifacts: Vec<ArtifactRecord>,
    ) -> Self {
        Self {
            suite: suite.to_string(),
            name: item.name.clone(),
            description: item.case.description.clone(),
            priority: item.case.priority,
            status,
            duration_ms: elapsed.as_millis() as u64,
            failure,
            artifacts,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }
}

/// Result of one suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    /// before_all / after_all failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureRecord>,
    pub cases: Vec<CaseResult>,
}

impl SuiteResult {
    pub(crate) fn from_cases(
        name: &str,
        cases: Vec<CaseResult>,
        elapsed: Duration,
        error: Option<FailureRecord>,
    ) -> Self {
        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
        Self {
            name: name.to_string(),
            total: cases.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            duration_ms: elapsed.as_millis() as u64,
            error,
            cases,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| c.status == CaseStatus::Failed)
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunReport {
    fn from_suites(started_at: DateTime<Utc>, suites: Vec<SuiteResult>, elapsed: Duration) -> Self {
        Self {
            started_at,
            total: suites.iter().map(|s| s.total).sum(),
            passed: suites.iter().map(|s| s.passed).sum(),
            failed: suites.iter().map(|s| s.failed).sum(),
            skipped: suites.iter().map(|s| s.skipped).sum(),
            duration_ms: elapsed.as_millis() as u64,
            suites,
        }
    }

    /// No failed case and no broken suite hook
    pub fn success(&self) -> bool {
        self.failed == 0 && self.suites.iter().all(|s| s.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseResult> {
        self.suites.iter().flat_map(|s| s.failures())
    }
}

/// Main E2E test runner
pub struct TestRunner {
    context: HarnessContext,

    suites: Vec<Box<dyn RunnableSuite>>,

    /// Only run cases with this (logical or expanded) name
    case_filter: Option<String>,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    pub fn new(context: HarnessContext) -> Self {
        let output_dir = context.settings.results_dir.clone();
        Self {
            context,
            suites: Vec::new(),
            case_filter: None,
            output_dir,
        }
    }

    pub fn register<S: SuiteState>(&mut self, suite: Suite<S>) -> &mut Self {
        self.suites.push(Box::new(suite));
        self
    }

    pub fn with_case_filter(mut self, name: Option<String>) -> Self {
        self.case_filter = name;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn context(&self) -> &HarnessContext {
        &self.context
    }

    pub fn suite_names(&self) -> Vec<&str> {
        self.suites.iter().map(|s| s.name()).collect()
    }

    /// Run every registered suite
    pub async fn run_all(&self) -> RunReport {
        let filter = CaseFilter {
            name: self.case_filter.clone(),
            tag: None,
        };
        self.run_filtered(|_| true, &filter).await
    }

    /// Run cases tagged `tag` (on the suite or on the case)
    pub async fn run_tagged(&self, tag: &str) -> RunReport {
        let filter = CaseFilter {
            name: self.case_filter.clone(),
            tag: Some(tag.to_string()),
        };
        self.run_filtered(|_| true, &filter).await
    }

    /// Run one suite by name
    pub async fn run_suite(&self, name: &str) -> E2eResult<RunReport> {
        if !self.suites.iter().any(|s| s.name() == name) {
            return Err(E2eError::Config(format!("Suite not found: {}", name)));
        }
        let filter = CaseFilter {
            name: self.case_filter.clone(),
            tag: None,
        };
        Ok(self.run_filtered(|s| s.name() == name, &filter).await)
    }

    async fn run_filtered<F>(&self, select: F, filter: &CaseFilter) -> RunReport
    where
        F: Fn(&dyn RunnableSuite) -> bool,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();

        for suite in self.suites.iter().filter(|s| select(s.as_ref())) {
            let result = suite.run(&self.context, filter).await;
            if result.total > 0 {
                results.push(result);
            }
        }

        let report = RunReport::from_suites(started_at, results, start.elapsed());

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            report.passed, report.failed, report.skipped, report.duration_ms
        );
        report
    }

    /// Write `test-results.json` and the screenshot manifest `artifacts.json`
    pub fn write_results(&self, report: &RunReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        if let Err(e) = self.write_manifest(&self.context.settings.artifacts_dir) {
            warn!("Artifact manifest not written: {}", e);
        }

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    fn write_manifest(&self, artifacts_dir: &Path) -> E2eResult<()> {
        let records = artifacts::index_dir(artifacts_dir)?;
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(self.output_dir.join("artifacts.json"), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessSettings;
    use crate::fixtures::FixtureStore;
    use crate::suite::{Case, CaseParams};
    use futures::future::BoxFuture;
    use futures::FutureExt;

    const FIXTURES: &str = r#"{
        "validUsers": [{"name": "A"}, {"name": "B"}, {"name": "C"}],
        "authData": {"validCredentials": {"username": "u", "password": "p"}}
    }"#;

    struct Empty;

    impl SuiteState for Empty {}

    fn setup<'a>(_: &'a HarnessContext) -> BoxFuture<'a, E2eResult<Empty>> {
        async { Ok(Empty) }.boxed()
    }

    fn pass<'a>(_: &'a mut Empty, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
        async { Ok(()) }.boxed()
    }

    fn fail<'a>(_: &'a mut Empty, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
        async { crate::verify::is_true(false, "should hold") }.boxed()
    }

    fn runner(results_dir: &Path) -> TestRunner {
        let mut settings = HarnessSettings::for_backend("http://localhost", 1);
        settings.results_dir = results_dir.to_path_buf();
        settings.artifacts_dir = results_dir.join("screenshots");
        let context = HarnessContext::new(settings, FixtureStore::from_json_str(FIXTURES).unwrap());

        let mut runner = TestRunner::new(context);
        runner
            .register(
                Suite::new("alpha", setup)
                    .tag("api")
                    .case(Case::new("ok", pass))
                    .case(Case::new("broken", fail).tag("flaky")),
            )
            .register(Suite::new("beta", setup).case(Case::new("ok", pass)));
        runner
    }

    #[tokio::test]
    async fn run_all_aggregates_suites_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner(dir.path()).run_all().await;
        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.success());
        let names: Vec<_> = report.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let failure = report.failures().next().unwrap();
        assert_eq!(failure.suite, "alpha");
        assert_eq!(failure.failure.as_ref().unwrap().message, "should hold");
    }

    #[tokio::test]
    async fn tag_and_suite_selection() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());

        let tagged = runner.run_tagged("flaky").await;
        assert_eq!(tagged.total, 1);
        assert_eq!(tagged.suites.len(), 1);

        let beta = runner.run_suite("beta").await.unwrap();
        assert!(beta.success());
        assert!(runner.run_suite("gamma").await.is_err());
    }

    #[tokio::test]
    async fn case_filter_applies_across_suites() {
        let dir = tempfile::tempdir().unwrap();
        let report = runner(dir.path()).with_case_filter(Some("ok".into())).run_all().await;
        assert_eq!(report.total, 2);
        assert!(report.success());
    }

    #[tokio::test]
    async fn results_are_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path());
        let report = runner.run_all().await;

        std::fs::create_dir_all(dir.path().join("screenshots")).unwrap();
        std::fs::write(dir.path().join("screenshots/1_login_page.png"), b"img").unwrap();

        let path = runner.write_results(&report).unwrap();
        let written: RunReport = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.failed, 1);
        assert_eq!(written.suites[0].cases[1].status, CaseStatus::Failed);

        let manifest: Vec<ArtifactRecord> =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("artifacts.json")).unwrap()).unwrap();
        assert_eq!(manifest.len(), 1);
    }
}
