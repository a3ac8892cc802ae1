// Conformance runner — drives the fixed suite against one adapter.
//
// 1. Calls the inspector's `connect` hook
// 2. Runs every scenario, recording pass/fail and duration
// 3. Calls `disconnect`
// 4. Returns the report; a failing scenario does not stop the run

use std::sync::Arc;
use std::time::Instant;

use auth_adapter_core::{Adapter, BoxError};

use crate::inspector::StorageInspector;
use crate::report::{ConformanceReport, ScenarioOutcome};
use crate::scenarios::{self, ScenarioContext};

/// The run could not be set up or torn down.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("inspector connect failed: {0}")]
    Connect(#[source] BoxError),

    #[error("inspector disconnect failed: {0}")]
    Disconnect(#[source] BoxError),
}

/// Runs the conformance suite against an adapter and its inspector.
pub struct ConformanceRunner {
    adapter: Arc<dyn Adapter>,
    inspector: Arc<dyn StorageInspector>,
    display_name: String,
    prefix: Option<String>,
    skip: Vec<String>,
}

impl ConformanceRunner {
    pub fn new(adapter: Arc<dyn Adapter>, inspector: Arc<dyn StorageInspector>) -> Self {
        let display_name = adapter.name().to_string();
        Self {
            adapter,
            inspector,
            display_name,
            prefix: None,
            skip: Vec::new(),
        }
    }

    /// Name shown in logs and the report (default: the adapter's `name()`).
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Prefix added to every scenario name in the report.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Leave out a scenario by name.
    pub fn skip(mut self, scenario: impl Into<String>) -> Self {
        self.skip.push(scenario.into());
        self
    }

    pub async fn run(&self) -> Result<ConformanceReport, HarnessError> {
        let started = Instant::now();
        let mut report = ConformanceReport::new(&self.display_name);
        tracing::info!(adapter = %self.display_name, "starting conformance run");

        let setup = Instant::now();
        self.inspector.connect().await.map_err(HarnessError::Connect)?;
        report.setup_ms += elapsed_ms(setup);

        let cx = ScenarioContext {
            adapter: self.adapter.as_ref(),
            inspector: self.inspector.as_ref(),
        };

        for scenario in scenarios::all() {
            if self.skip.iter().any(|name| name == scenario.name) {
                tracing::debug!(adapter = %self.display_name, scenario = scenario.name, "skipped");
                continue;
            }
            let name = match self.prefix {
                Some(ref prefix) => format!("{prefix} > {}", scenario.name),
                None => scenario.name.to_string(),
            };

            let scenario_start = Instant::now();
            let result = (scenario.run)(&cx).await;
            let duration_ms = elapsed_ms(scenario_start);

            let error = match result {
                Ok(()) => {
                    tracing::info!(adapter = %self.display_name, "✓ {name}");
                    None
                }
                Err(err) => {
                    tracing::error!(adapter = %self.display_name, "✗ {name}: {err}");
                    Some(err.to_string())
                }
            };
            report.outcomes.push(ScenarioOutcome {
                name,
                error,
                duration_ms,
            });
        }

        let teardown = Instant::now();
        self.inspector
            .disconnect()
            .await
            .map_err(HarnessError::Disconnect)?;
        report.setup_ms += elapsed_ms(teardown);
        report.total_duration_ms = elapsed_ms(started);

        tracing::info!(
            adapter = %self.display_name,
            passed = report.passed_count(),
            failed = report.failed_count(),
            "conformance run finished"
        );
        Ok(report)
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
