//! Scenario execution with verdicts and guaranteed follow teardown
//!
//! A scenario body gets a [`ScenarioContext`] holding the seed sessions,
//! the convergence waiters and a [`TeardownScope`]. After the body returns,
//! fails, times out or panics, the scope's follow edges are released.
//!
//! Scenarios declare an [`Expectation`]. A known server bug is expressed as
//! `KnownFailure` so it stays distinct from a regression, and a known bug
//! that stops reproducing is reported as an unexpected pass.

use crate::session::Session;
use crate::teardown::TeardownScope;
use crate::waiter::ConvergenceWaiter;
use chrono::{DateTime, Utc};
use fedsuite_core::views::CommunityView;
use fedsuite_core::{CommunityId, Error, Result, SuiteConfig};
pub use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Body of a scenario.
pub type ScenarioFn = for<'a> fn(&'a mut ScenarioContext) -> LocalBoxFuture<'a, Result<()>>;

/// Turn `async fn(&mut ScenarioContext) -> Result<()>` into a [`ScenarioFn`].
#[macro_export]
macro_rules! scenario_body {
    ($body:path) => {{
        fn boxed(
            ctx: &mut $crate::scenario::ScenarioContext,
        ) -> $crate::scenario::LocalBoxFuture<'_, $crate::Result<()>> {
            ::std::boxed::Box::pin($body(ctx))
        }
        boxed as $crate::scenario::ScenarioFn
    }};
}

/// What a scenario is expected to do against current servers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    Pass,
    /// Fails because of a known server bug.
    KnownFailure { reason: String },
}

/// Outcome of one scenario, judged against its expectation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    ExpectedFailure,
    UnexpectedPass,
}

impl Verdict {
    fn judge(expectation: &Expectation, succeeded: bool) -> Self {
        match (expectation, succeeded) {
            (Expectation::Pass, true) => Verdict::Passed,
            (Expectation::Pass, false) => Verdict::Failed,
            (Expectation::KnownFailure { .. }, false) => Verdict::ExpectedFailure,
            (Expectation::KnownFailure { .. }, true) => Verdict::UnexpectedPass,
        }
    }

    /// Whether this verdict should fail the run.
    pub fn is_blocking(self) -> bool {
        matches!(self, Verdict::Failed | Verdict::UnexpectedPass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Passed => "passed",
            Verdict::Failed => "failed",
            Verdict::ExpectedFailure => "expected failure",
            Verdict::UnexpectedPass => "unexpected pass",
        };
        f.write_str(s)
    }
}

/// Federation scenario definition
#[derive(Clone, Serialize)]
pub struct Scenario {
    /// Unique identifier, used by `--scenario` filters
    pub id: String,
    pub name: String,
    pub description: String,
    /// Budget for the whole body, waits included
    pub timeout: Duration,
    pub expectation: Expectation,
    pub tags: Vec<String>,
    #[serde(skip)]
    body: ScenarioFn,
}

impl Scenario {
    pub fn new(id: &str, name: &str, description: &str, timeout: Duration, body: ScenarioFn) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            timeout,
            expectation: Expectation::Pass,
            tags: Vec::new(),
            body,
        }
    }

    pub fn with_tags(mut self, tags: Vec<&str>) -> Self {
        self.tags = tags.into_iter().map(|t| t.to_string()).collect();
        self
    }

    /// Mark the scenario as failing because of a known server bug.
    pub fn known_failure(mut self, reason: &str) -> Self {
        self.expectation = Expectation::KnownFailure {
            reason: reason.to_string(),
        };
        self
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("expectation", &self.expectation)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Selects scenarios by id or tag; empty lists select everything.
#[derive(Clone, Debug, Default)]
pub struct ScenarioFilter {
    pub ids: Vec<String>,
    pub tags: Vec<String>,
}

impl ScenarioFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        let id_ok = self.ids.is_empty() || self.ids.iter().any(|id| id == &scenario.id);
        let tag_ok = self.tags.is_empty() || self.tags.iter().any(|t| scenario.tags.contains(t));
        id_ok && tag_ok
    }
}

/// State handed to a scenario body
pub struct ScenarioContext {
    sessions: HashMap<String, Session>,
    waiter: ConvergenceWaiter,
    relay: ConvergenceWaiter,
    scope: TeardownScope,
    main_community: String,
    details: HashMap<String, Value>,
}

impl ScenarioContext {
    /// Seed session of the named instance.
    pub fn session(&self, name: &str) -> Result<Session> {
        self.sessions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("no session for instance {}", name)))
    }

    /// Waiter for a single hop between two instances.
    pub fn waiter(&self) -> ConvergenceWaiter {
        self.waiter
    }

    /// Waiter for relays through a third instance.
    pub fn relay_waiter(&self) -> ConvergenceWaiter {
        self.relay
    }

    pub fn main_community(&self) -> &str {
        &self.main_community
    }

    /// Follow and record the edge for teardown.
    pub async fn follow(&mut self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        self.scope.follow(session, community_id).await
    }

    pub async fn unfollow(&mut self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        self.scope.unfollow(session, community_id).await
    }

    pub async fn await_approval(&self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        self.scope.await_approval(session, community_id).await
    }

    pub async fn await_rejection(&self, session: &Session, community_id: CommunityId) -> Result<CommunityView> {
        self.scope.await_rejection(session, community_id).await
    }

    /// Attach a value to the scenario's result.
    pub fn note(&mut self, key: &str, value: Value) {
        self.details.insert(key.to_string(), value);
    }
}

/// Result of a single scenario execution
#[derive(Clone, Debug, Serialize)]
pub struct ScenarioResult {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub expectation: Expectation,
    pub verdict: Verdict,
    pub duration: Duration,
    /// Body or teardown error, if any
    pub error_message: Option<String>,
    pub details: HashMap<String, Value>,
}

/// Results of one suite run
#[derive(Clone, Debug, Serialize)]
pub struct SuiteResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ScenarioResult>,
    pub total_duration: Duration,
}

impl SuiteResult {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.results.iter().filter(|r| r.verdict == verdict).count()
    }

    pub fn counts(&self) -> BTreeMap<Verdict, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.verdict).or_insert(0) += 1;
        }
        counts
    }

    pub fn with_verdict(&self, verdict: Verdict) -> Vec<&ScenarioResult> {
        self.results.iter().filter(|r| r.verdict == verdict).collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&ScenarioResult> {
        self.results
            .iter()
            .filter(|r| r.tags.iter().any(|t| t == tag))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        !self.results.iter().any(|r| r.verdict.is_blocking())
    }

    /// Process exit code: non-zero only for regressions and unexpected passes.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for SuiteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Federation Suite Results: run {}", self.run_id)?;
        writeln!(f, "================================")?;
        writeln!(f, "Total Scenarios: {}", self.results.len())?;
        writeln!(f, "Passed: {}", self.count(Verdict::Passed))?;
        writeln!(f, "Failed: {}", self.count(Verdict::Failed))?;
        writeln!(f, "Expected Failures: {}", self.count(Verdict::ExpectedFailure))?;
        writeln!(f, "Unexpected Passes: {}", self.count(Verdict::UnexpectedPass))?;
        writeln!(f, "Total Duration: {:?}", self.total_duration)?;

        let failed = self.with_verdict(Verdict::Failed);
        if !failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed Scenarios:")?;
            for result in failed {
                writeln!(
                    f,
                    "  ❌ {}: {}",
                    result.name,
                    result.error_message.as_deref().unwrap_or("Unknown error")
                )?;
            }
        }

        let unexpected = self.with_verdict(Verdict::UnexpectedPass);
        if !unexpected.is_empty() {
            writeln!(f)?;
            writeln!(f, "Unexpected Passes (known bug no longer reproduces):")?;
            for result in unexpected {
                if let Expectation::KnownFailure { reason } = &result.expectation {
                    writeln!(f, "  ⚠️ {}: {}", result.name, reason)?;
                }
            }
        }

        let known = self.with_verdict(Verdict::ExpectedFailure);
        if !known.is_empty() {
            writeln!(f)?;
            writeln!(f, "Known Failures:")?;
            for result in known {
                if let Expectation::KnownFailure { reason } = &result.expectation {
                    writeln!(f, "  ➖ {}: {}", result.name, reason)?;
                }
            }
        }

        Ok(())
    }
}

/// Runs scenarios sequentially against one set of sessions
pub struct ScenarioRunner {
    scenarios: Vec<Scenario>,
    sessions: HashMap<String, Session>,
    waiter: ConvergenceWaiter,
    relay: ConvergenceWaiter,
    follow_recheck: Duration,
    main_community: String,
}

impl ScenarioRunner {
    pub fn new(sessions: Vec<Session>, config: &SuiteConfig) -> Self {
        Self {
            scenarios: Vec::new(),
            sessions: sessions
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
            waiter: ConvergenceWaiter::propagation(config),
            relay: ConvergenceWaiter::relay(config),
            follow_recheck: config.follow_recheck(),
            main_community: config.setup.main_community.clone(),
        }
    }

    pub fn add_scenario(&mut self, scenario: Scenario) {
        self.scenarios.push(scenario);
    }

    pub fn add_scenarios<I: IntoIterator<Item = Scenario>>(&mut self, scenarios: I) {
        self.scenarios.extend(scenarios);
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Execute every scenario the filter selects, in registration order.
    pub async fn run(&self, filter: &ScenarioFilter) -> SuiteResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let suite_start = Instant::now();
        info!(run_id = %run_id, "Starting federation suite");

        let mut results = Vec::new();
        for scenario in self.scenarios.iter().filter(|s| filter.matches(s)) {
            info!("Executing scenario: {}", scenario.name);
            let result = self.execute_scenario(scenario).await;
            match result.verdict {
                Verdict::Passed | Verdict::ExpectedFailure => {
                    info!(scenario = %scenario.id, verdict = %result.verdict, "Scenario finished")
                }
                Verdict::Failed | Verdict::UnexpectedPass => {
                    error!(scenario = %scenario.id, verdict = %result.verdict, error = ?result.error_message, "Scenario finished")
                }
            }
            results.push(result);
        }

        let suite = SuiteResult {
            run_id,
            started_at,
            results,
            total_duration: suite_start.elapsed(),
        };
        info!(
            run_id = %run_id,
            total = suite.results.len(),
            failed = suite.count(Verdict::Failed),
            "Federation suite finished"
        );
        suite
    }

    async fn execute_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start_time = Instant::now();
        let mut ctx = ScenarioContext {
            sessions: self.sessions.clone(),
            waiter: self.waiter,
            relay: self.relay,
            scope: TeardownScope::new(self.waiter, self.follow_recheck),
            main_community: self.main_community.clone(),
            details: HashMap::new(),
        };
        ctx.note("test_start", json!(Utc::now().to_rfc3339()));

        debug!("Executing scenario: {} ({})", scenario.name, scenario.id);

        let outcome = timeout(
            scenario.timeout,
            AssertUnwindSafe((scenario.body)(&mut ctx)).catch_unwind(),
        )
        .await;

        let body_error = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e.to_string()),
            Ok(Err(panic)) => Some(format!("panicked: {}", panic_message(panic))),
            Err(_) => Some(
                Error::timeout(
                    format!("scenario {}", scenario.id),
                    scenario.timeout.as_millis() as u64,
                    1,
                    None,
                )
                .to_string(),
            ),
        };

        let teardown_error = match ctx.scope.release().await {
            Ok(()) => None,
            Err(e) => {
                warn!(scenario = %scenario.id, error = %e, "Teardown failed");
                Some(format!("teardown: {}", e))
            }
        };

        // A failed teardown leaks follows into later scenarios, so it blocks
        // the run even when the body was expected to fail.
        let verdict = if teardown_error.is_some() {
            Verdict::Failed
        } else {
            Verdict::judge(&scenario.expectation, body_error.is_none())
        };
        let error_message = match (body_error, teardown_error) {
            (Some(body), Some(teardown)) => Some(format!("{}; {}", body, teardown)),
            (body, teardown) => body.or(teardown),
        };

        ScenarioResult {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            expectation: scenario.expectation.clone(),
            verdict,
            duration: start_time.elapsed(),
            error_message,
            details: ctx.details,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
