//! Suite definitions and the per-case execution engine
//!
//! A [`Suite`] is a named list of [`Case`]s sharing one state value `S`
//! built by `before_all`. Cases run in ascending priority (declaration order
//! breaks ties); a case bound to a data provider expands into one concrete
//! case per parameter tuple, named `name[i]`.
//!
//! Case bodies and hooks are plain functions returning boxed futures:
//!
//! ```ignore
//! fn health<'a>(s: &'a mut ApiState, _: &'a CaseParams) -> BoxFuture<'a, E2eResult<()>> {
//!     async move {
//!         let resp = s.api.health_check().await?;
//!         verify::equals(resp.status(), 200, "health")
//!     }
//!     .boxed()
//! }
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactRecord;
use crate::config::HarnessSettings;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::FixtureStore;
use crate::runner::{CaseResult, FailureRecord, SuiteResult};

/// Everything a suite needs from the outside world
#[derive(Debug, Clone)]
pub struct HarnessContext {
    pub settings: HarnessSettings,
    pub fixtures: Arc<FixtureStore>,
}

impl HarnessContext {
    pub fn new(settings: HarnessSettings, fixtures: FixtureStore) -> Self {
        Self {
            settings,
            fixtures: Arc::new(fixtures),
        }
    }
}

/// One parameter tuple from a data provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseParams {
    pub index: usize,
    pub values: Vec<Value>,
}

impl CaseParams {
    pub fn new(index: usize, values: Vec<Value>) -> Self {
        Self { index, values }
    }

    pub fn get(&self, position: usize) -> E2eResult<&Value> {
        self.values.get(position).ok_or_else(|| {
            E2eError::Config(format!(
                "case parameter {} missing ({} supplied)",
                position,
                self.values.len()
            ))
        })
    }

    pub fn parse<T: DeserializeOwned>(&self, position: usize) -> E2eResult<T> {
        Ok(serde_json::from_value(self.get(position)?.clone())?)
    }

    pub fn str(&self, position: usize) -> E2eResult<&str> {
        self.get(position)?
            .as_str()
            .ok_or_else(|| E2eError::Config(format!("case parameter {} is not a string", position)))
    }
}

pub type CaseBody<S> = for<'a> fn(&'a mut S, &'a CaseParams) -> BoxFuture<'a, E2eResult<()>>;
pub type Hook<S> = for<'a> fn(&'a mut S) -> BoxFuture<'a, E2eResult<()>>;
pub type BeforeAll<S> = for<'a> fn(&'a HarnessContext) -> BoxFuture<'a, E2eResult<S>>;
pub type AfterAll<S> = fn(S) -> BoxFuture<'static, E2eResult<()>>;

/// Produces the ordered parameter tuples for a data-driven case
pub type DataProvider = fn(&HarnessContext) -> E2eResult<Vec<Vec<Value>>>;

/// State shared by the cases of a suite
pub trait SuiteState: Send + 'static {
    /// Files captured during the last case, attached to its result
    fn drain_artifacts(&mut self) -> Vec<PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl CaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaseStatus::Passed | CaseStatus::Failed | CaseStatus::Skipped)
    }

    /// Move to `next` if the transition is allowed
    pub fn advance(self, next: CaseStatus) -> E2eResult<CaseStatus> {
        use CaseStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Skipped) => Ok(next),
            (Running, Passed) | (Running, Failed) | (Running, Skipped) => Ok(next),
            // A failing after_each demotes a passed case
            (Passed, Failed) => Ok(next),
            _ => Err(E2eError::Config(format!(
                "invalid case transition {:?} -> {:?}",
                self, next
            ))),
        }
    }
}

pub struct Case<S> {
    pub name: String,
    pub priority: i32,
    pub description: Option<String>,
    pub data: Option<String>,
    pub tags: Vec<String>,
    pub timeout: Option<Duration>,
    pub enabled: bool,
    pub body: CaseBody<S>,
}

impl<S> Case<S> {
    pub fn new(name: impl Into<String>, body: CaseBody<S>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            description: None,
            data: None,
            tags: Vec::new(),
            timeout: None,
            enabled: true,
            body,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bind to a data provider registered on the suite
    pub fn data(mut self, provider: impl Into<String>) -> Self {
        self.data = Some(provider.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

pub struct Suite<S> {
    pub name: String,
    pub tags: Vec<String>,
    before_all: BeforeAll<S>,
    before_each: Option<Hook<S>>,
    after_each: Option<Hook<S>>,
    after_all: Option<AfterAll<S>>,
    providers: HashMap<String, DataProvider>,
    cases: Vec<Case<S>>,
}

impl<S: SuiteState> Suite<S> {
    pub fn new(name: impl Into<String>, before_all: BeforeAll<S>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            before_all,
            before_each: None,
            after_each: None,
            after_all: None,
            providers: HashMap::new(),
            cases: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn before_each(mut self, hook: Hook<S>) -> Self {
        self.before_each = Some(hook);
        self
    }

    pub fn after_each(mut self, hook: Hook<S>) -> Self {
        self.after_each = Some(hook);
        self
    }

    pub fn after_all(mut self, hook: AfterAll<S>) -> Self {
        self.after_all = Some(hook);
        self
    }

    pub fn provider(mut self, name: impl Into<String>, provider: DataProvider) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    pub fn case(mut self, case: Case<S>) -> Self {
        self.cases.push(case);
        self
    }

    pub fn cases(&self) -> &[Case<S>] {
        &self.cases
    }

    /// Expand data-driven cases and order everything by priority
    fn plan(&self, ctx: &HarnessContext, filter: &CaseFilter) -> Vec<Planned<'_, S>> {
        let mut ordered: Vec<&Case<S>> = self
            .cases
            .iter()
            .filter(|case| filter.matches_tags(&self.tags, &case.tags))
            .collect();
        // sort_by_key is stable, so equal priorities keep declaration order
        ordered.sort_by_key(|case| case.priority);

        let mut planned = Vec::new();
        for case in ordered {
            let Some(provider_name) = &case.data else {
                if filter.matches_name(&case.name, &case.name) {
                    planned.push(Planned {
                        case,
                        name: case.name.clone(),
                        params: CaseParams::default(),
                        setup_error: None,
                    });
                }
                continue;
            };

            let tuples = match self.providers.get(provider_name) {
                Some(provider) => provider(ctx),
                None => Err(E2eError::Config(format!(
                    "unknown data provider '{}'",
                    provider_name
                ))),
            };

            match tuples {
                Ok(tuples) => {
                    for (index, values) in tuples.into_iter().enumerate() {
                        let name = format!("{}[{}]", case.name, index);
                        if filter.matches_name(&case.name, &name) {
                            planned.push(Planned {
                                case,
                                name,
                                params: CaseParams::new(index, values),
                                setup_error: None,
                            });
                        }
                    }
                }
                Err(e) if filter.matches_name(&case.name, &case.name) => planned.push(Planned {
                    case,
                    name: case.name.clone(),
                    params: CaseParams::default(),
                    setup_error: Some(e),
                }),
                Err(_) => {}
            }
        }
        planned
    }

    /// Run the suite: before_all, every planned case, after_all
    pub async fn execute(&self, ctx: &HarnessContext, filter: &CaseFilter) -> SuiteResult {
        let start = Instant::now();
        let planned = self.plan(ctx, filter);
        let mut results = Vec::with_capacity(planned.len());

        if planned.is_empty() {
            debug!("Suite '{}': no cases selected", self.name);
            return SuiteResult::from_cases(&self.name, results, start.elapsed(), None);
        }

        info!("Suite '{}': {} case(s)", self.name, planned.len());

        let setup = guarded(
            "before_all",
            ctx.settings.case_timeout,
            (self.before_all)(ctx),
        )
        .await;

        let mut state = match setup {
            Ok(state) => state,
            Err(e) => {
                error!("Suite '{}': before_all failed: {}", self.name, e);
                let reason = format!("before_all failed: {}", e);
                for item in &planned {
                    results.push(CaseResult::skipped(&self.name, item, &reason));
                }
                let suite_error = Some(FailureRecord::from_error(&e, "before_all"));
                return SuiteResult::from_cases(&self.name, results, start.elapsed(), suite_error);
            }
        };

        for item in &planned {
            let result = self.run_case(ctx, &mut state, item).await;
            match result.status {
                CaseStatus::Passed => info!("✓ {}::{} ({} ms)", self.name, result.name, result.duration_ms),
                CaseStatus::Skipped => info!("- {}::{} (skipped)", self.name, result.name),
                _ => error!(
                    "✗ {}::{} - {}",
                    self.name,
                    result.name,
                    result.failure.as_ref().map(|f| f.message.as_str()).unwrap_or("unknown error")
                ),
            }
            results.push(result);
        }

        let mut suite_error = None;
        if let Some(after_all) = self.after_all {
            if let Err(e) = guarded("after_all", ctx.settings.case_timeout, after_all(state)).await {
                warn!("Suite '{}': after_all failed: {}", self.name, e);
                suite_error = Some(FailureRecord::from_error(&e, "after_all"));
            }
        }

        SuiteResult::from_cases(&self.name, results, start.elapsed(), suite_error)
    }

    async fn run_case(&self, ctx: &HarnessContext, state: &mut S, item: &Planned<'_, S>) -> CaseResult {
        let start = Instant::now();
        let mut status = CaseStatus::Pending;

        if !item.case.enabled {
            return CaseResult::skipped(&self.name, item, "disabled");
        }

        if let Some(e) = &item.setup_error {
            return CaseResult::finished(
                &self.name,
                item,
                CaseStatus::Failed,
                start.elapsed(),
                Some(FailureRecord::from_error(e, "data_provider")),
                Vec::new(),
            );
        }

        status = advance(status, CaseStatus::Running);
        debug!("Running {}::{}", self.name, item.name);
        let limit = item.case.timeout.unwrap_or(ctx.settings.case_timeout);

        let mut failure = None;
        let before = match self.before_each {
            Some(hook) => guarded("before_each", limit, hook(state)).await,
            None => Ok(()),
        };

        match before {
            Err(e) => {
                status = advance(status, CaseStatus::Failed);
                failure = Some(FailureRecord::from_error(&e, "before_each"));
            }
            Ok(()) => {
                let label = format!("case '{}'", item.name);
                match guarded(&label, limit, (item.case.body)(state, &item.params)).await {
                    Ok(()) => status = advance(status, CaseStatus::Passed),
                    Err(e) => {
                        status = advance(status, CaseStatus::Failed);
                        failure = Some(FailureRecord::from_error(&e, "body"));
                    }
                }
            }
        }

        if let Some(hook) = self.after_each {
            if let Err(e) = guarded("after_each", limit, hook(state)).await {
                warn!("{}::{}: after_each failed: {}", self.name, item.name, e);
                if status == CaseStatus::Passed {
                    status = advance(status, CaseStatus::Failed);
                    failure = Some(FailureRecord::from_error(&e, "after_each"));
                }
            }
        }

        let artifacts = state
            .drain_artifacts()
            .into_iter()
            .filter_map(|path| match ArtifactRecord::capture(&path) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Artifact {} not recorded: {}", path.display(), e);
                    None
                }
            })
            .collect();

        CaseResult::finished(&self.name, item, status, start.elapsed(), failure, artifacts)
    }
}

fn advance(current: CaseStatus, next: CaseStatus) -> CaseStatus {
    match current.advance(next) {
        Ok(status) => status,
        Err(e) => {
            warn!("{}", e);
            next
        }
    }
}

/// A concrete case after provider expansion
pub(crate) struct Planned<'s, S> {
    pub(crate) case: &'s Case<S>,
    pub(crate) name: String,
    pub(crate) params: CaseParams,
    setup_error: Option<E2eError>,
}

/// Run a hook or body under a timeout, turning panics into errors
async fn guarded<T>(label: &str, limit: Duration, fut: BoxFuture<'_, E2eResult<T>>) -> E2eResult<T> {
    match tokio::time::timeout(limit, AssertUnwindSafe(fut).catch_unwind()).await {
        Err(_) => Err(E2eError::Timeout(format!("{} after {} ms", label, limit.as_millis()))),
        Ok(Err(panic)) => Err(E2eError::Panic(panic_message(panic.as_ref()))),
        Ok(Ok(result)) => result,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Narrows which cases run
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Logical (`name`) or expanded (`name[2]`) case name
    pub name: Option<String>,
    /// Matches suite or case tags
    pub tag: Option<String>,
}

impl CaseFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            tag: None,
        }
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            name: None,
            tag: Some(tag.into()),
        }
    }

    fn matches_name(&self, logical: &str, expanded: &str) -> bool {
        match &self.name {
            Some(name) => name == logical || name == expanded,
            None => true,
        }
    }

    fn matches_tags(&self, suite_tags: &[String], case_tags: &[String]) -> bool {
        match &self.tag {
            Some(tag) => suite_tags.iter().chain(case_tags).any(|t| t == tag),
            None => true,
        }
    }
}

/// Object-safe view of a suite, whatever its state type
pub trait RunnableSuite: Send + Sync {
    fn name(&self) -> &str;

    fn tags(&self) -> &[String];

    fn run<'a>(&'a self, ctx: &'a HarnessContext, filter: &'a CaseFilter) -> BoxFuture<'a, SuiteResult>;
}

impl<S: SuiteState> RunnableSuite for Suite<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn run<'a>(&'a self, ctx: &'a HarnessContext, filter: &'a CaseFilter) -> BoxFuture<'a, SuiteResult> {
        self.execute(ctx, filter).boxed()
    }
}
