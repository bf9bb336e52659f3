//! Runs a selection of scenarios and collects their outcomes.

use std::{
    fmt,
    time::{Duration, Instant},
};

use postcheck_common::internal;

use crate::scenario::{Scenario, ScenarioContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub results: Vec<ScenarioReport>,
}

impl SuiteReport {
    fn count(&self, wanted: fn(&Outcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|report| wanted(&report.outcome))
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped(_)))
    }

    /// No scenario failed. Skipped scenarios do not count against the suite.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, scenario: Scenario) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|report| report.scenario == scenario)
            .map(|report| &report.outcome)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.results {
            let millis = report.elapsed.as_millis();
            match &report.outcome {
                Outcome::Passed => writeln!(f, "PASS  {} ({millis}ms)", report.scenario)?,
                Outcome::Failed(reason) => {
                    writeln!(f, "FAIL  {} ({millis}ms): {reason}", report.scenario)?;
                }
                Outcome::Skipped(reason) => writeln!(f, "SKIP  {}: {reason}", report.scenario)?,
            }
        }

        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )
    }
}

/// Run each of `scenarios` in order against `ctx`.
///
/// The record store is cleared before and after every scenario that runs.
#[tracing::instrument(
    target = "postcheck::internal",
    level = "debug",
    skip_all,
    fields(scenarios = scenarios.len())
)]
pub async fn run_suite(ctx: &ScenarioContext, scenarios: &[Scenario]) -> SuiteReport {
    let suite_started = Instant::now();
    let mut report = SuiteReport::default();

    for &scenario in scenarios {
        let started = Instant::now();
        let outcome = run_one(ctx, scenario).await;
        report.results.push(ScenarioReport {
            scenario,
            outcome,
            elapsed: started.elapsed(),
        });
    }

    internal!(
        level = INFO,
        "Suite finished in {:.2?}: {} passed, {} failed, {} skipped",
        suite_started.elapsed(),
        report.passed(),
        report.failed(),
        report.skipped()
    );

    report
}

#[tracing::instrument(
    target = "postcheck::internal",
    level = "info",
    skip_all,
    fields(scenario = %scenario)
)]
async fn run_one(ctx: &ScenarioContext, scenario: Scenario) -> Outcome {
    if let Some(reason) = scenario.skip_reason(&ctx.platform) {
        internal!(level = INFO, "Skipping {}: {}", scenario, reason);
        return Outcome::Skipped(reason);
    }

    if let Err(err) = ctx.store.clear().await {
        return Outcome::Failed(format!("Could not clear record store: {err}"));
    }

    internal!(level = INFO, "Running {}", scenario);
    let outcome = match scenario.run(ctx).await {
        Ok(()) => Outcome::Passed,
        Err(err) => {
            internal!(level = WARN, "{} failed: {}", scenario, err);
            Outcome::Failed(err.to_string())
        }
    };

    // In-flight deliveries must land before the store is cleared
    ctx.service.flush().await;
    if let Err(err) = ctx.store.clear().await {
        internal!(level = WARN, "Could not clear record store after {}: {}", scenario, err);
    }

    outcome
}
