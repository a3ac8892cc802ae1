// Conformance report — per-scenario outcome plus run statistics.

/// Result of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: String,
    /// Failure message, `None` when the scenario passed.
    pub error: Option<String>,
    pub duration_ms: f64,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a full conformance run against one adapter.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub adapter: String,
    pub outcomes: Vec<ScenarioOutcome>,
    /// Time spent in the inspector's `connect` and `disconnect` hooks.
    pub setup_ms: f64,
    pub total_duration_ms: f64,
}

impl ConformanceReport {
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            outcomes: Vec::new(),
            setup_ms: 0.0,
            total_duration_ms: 0.0,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn outcome(&self, name: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Print a statistics summary.
    pub fn print_summary(&self) {
        let dash = "─".repeat(80);
        println!("\n{dash}");
        println!("CONFORMANCE SUMMARY: {}", self.adapter);
        println!("{dash}");
        for outcome in &self.outcomes {
            let mark = if outcome.passed() { "✓" } else { "✗" };
            println!("  {mark} {} ({:.2}ms)", outcome.name, outcome.duration_ms);
            if let Some(ref error) = outcome.error {
                println!("      {error}");
            }
        }
        println!("{dash}");
        println!(
            "  Passed: {}  Failed: {}  Total: {}",
            self.passed_count(),
            self.failed_count(),
            self.outcomes.len()
        );
        println!("  Setup/Teardown: {:.2}ms", self.setup_ms);
        println!("  Total Duration: {:.2}ms", self.total_duration_ms);
        println!("{dash}\n");
    }

    /// Panic with every failure message unless all scenarios passed.
    pub fn assert_all_passed(&self) {
        if self.is_success() {
            return;
        }
        let failures = self
            .failures()
            .map(|o| format!("  {}: {}", o.name, o.error.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\n");
        panic!(
            "{} of {} conformance scenarios failed for {}:\n{failures}",
            self.failed_count(),
            self.outcomes.len(),
            self.adapter
        );
    }
}
