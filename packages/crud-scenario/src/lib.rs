//! End-to-end CRUD acceptance scenario.
//!
//! Provisions a throwaway database, logs in, then creates, saves,
//! reloads, searches and deletes a user record, checking each outcome
//! with a fixed number of assertions.

pub mod assertions;
pub mod config;
pub mod scenario;

pub use assertions::{AssertionReport, Assertions, Outcome};
pub use config::ScenarioConfig;
pub use scenario::{CrudScenario, ScenarioReport, Step, StepFailure, EXPECTED_ASSERTIONS};
