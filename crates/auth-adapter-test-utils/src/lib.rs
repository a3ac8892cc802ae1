// auth-adapter-test-utils — conformance harness for adapters.
//
// Provides adapter testing infrastructure:
// - `StorageInspector` hooks for reading raw backend storage
// - the fixed scenario suite every adapter must pass unmodified
// - `ConformanceRunner` and its per-scenario `ConformanceReport`
// - fixture generators for users, accounts, sessions and verification tokens

pub mod fixtures;
pub mod inspector;
pub mod report;
pub mod runner;
pub mod scenarios;

pub use fixtures::{generate_account, generate_session, generate_user, generate_verification_token};
pub use inspector::{InspectorResult, StorageInspector};
pub use report::{ConformanceReport, ScenarioOutcome};
pub use runner::{ConformanceRunner, HarnessError};
pub use scenarios::{Scenario, ScenarioContext, ScenarioError, ScenarioResult};
