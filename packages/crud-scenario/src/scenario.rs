//! The CRUD scenario.
//!
//! Every step awaits the previous one. A failed remote call stops the
//! chain; the assertion recorder is concluded either way so the caller
//! always gets a report.

use std::fmt;
use std::sync::Arc;

use erp_rpc::{Connection, Context, Domain, Model, Record, RpcError, Session};
use serde_json::json;
use thiserror::Error;

use crate::assertions::{AssertionReport, Assertions};
use crate::config::ScenarioConfig;

/// Number of assertions a complete run executes.
pub const EXPECTED_ASSERTIONS: usize = 6;

/// Entity type exercised by the scenario.
const USER_MODEL: &str = "res.user";

/// Stage of the scenario, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Provision,
    Authenticate,
    Introspect,
    Create,
    Persist,
    Reload,
    Search,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Provision => "provision",
            Step::Authenticate => "authenticate",
            Step::Introspect => "introspect",
            Step::Create => "create",
            Step::Persist => "persist",
            Step::Reload => "reload",
            Step::Search => "search",
            Step::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Remote call failure that stopped the chain.
#[derive(Error, Debug, Clone)]
#[error("step '{step}' failed: {error}")]
pub struct StepFailure {
    pub step: Step,
    pub error: RpcError,
}

impl StepFailure {
    fn at(step: Step) -> impl FnOnce(RpcError) -> StepFailure {
        move |error| {
            tracing::error!("Step '{}' failed: {}", step, error);
            StepFailure { step, error }
        }
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Database provisioned for the run
    pub database: String,
    /// Assertion outcomes
    pub assertions: AssertionReport,
    /// Remote failure that aborted the chain, if any
    pub failure: Option<StepFailure>,
}

impl ScenarioReport {
    /// No remote failure and every assertion held.
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.assertions.passed()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "database: {}", self.database)?;
        writeln!(f, "{}", self.assertions)?;
        if let Some(failure) = &self.failure {
            writeln!(f, "aborted: {}", failure)?;
        }
        write!(f, "{}", if self.passed() { "PASS" } else { "FAIL" })
    }
}

/// CRUD acceptance scenario against one server.
#[derive(Debug, Clone)]
pub struct CrudScenario {
    config: ScenarioConfig,
}

impl CrudScenario {
    /// Creates the scenario.
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Runs the scenario to completion.
    ///
    /// Never fails: remote errors are captured in the report.
    pub async fn run(&self) -> ScenarioReport {
        let database = self.config.database_name();
        tracing::info!(
            "Running CRUD scenario on {} (database '{}')",
            self.config.server_url,
            database
        );

        let mut assertions = Assertions::new();
        assertions.expect(EXPECTED_ASSERTIONS);
        let result = self.run_steps(&database, &mut assertions).await;
        let report = ScenarioReport {
            database,
            assertions: assertions.done(),
            failure: result.err(),
        };

        if report.passed() {
            tracing::info!("CRUD scenario passed");
        } else {
            tracing::warn!("CRUD scenario failed");
        }
        report
    }

    async fn run_steps(
        &self,
        database: &str,
        assertions: &mut Assertions,
    ) -> Result<(), StepFailure> {
        let config = &self.config;
        let connection = Connection::new(&config.client_config())
            .map(Arc::new)
            .map_err(StepFailure::at(Step::Provision))?;

        tracing::info!("Step '{}'", Step::Provision);
        connection
            .create_database(
                database,
                &config.password,
                &config.language,
                &config.admin_password,
            )
            .await
            .map_err(StepFailure::at(Step::Provision))?;

        tracing::info!("Step '{}'", Step::Authenticate);
        let session = Session::login(
            connection,
            database,
            &config.login,
            &config.password,
            &config.language,
        )
        .await
        .map_err(StepFailure::at(Step::Authenticate))?;

        let outcome = exercise(&session, assertions).await;

        if config.logout_on_finish {
            if let Err(e) = session.logout().await {
                tracing::warn!("Logout failed: {}", e);
            }
        }
        outcome
    }
}

/// Introspect, create, persist, reload, search, delete.
async fn exercise(session: &Session, assertions: &mut Assertions) -> Result<(), StepFailure> {
    tracing::info!("Step '{}'", Step::Introspect);
    let mut users = Model::new(USER_MODEL);
    users
        .introspect(session)
        .await
        .map_err(StepFailure::at(Step::Introspect))?;

    tracing::info!("Step '{}'", Step::Create);
    let mut user = users.new_record();
    assertions.ok(user.id() < 0, "Unsaved");
    users
        .field("name")
        .and_then(|field| field.set_client(&mut user, "Test"))
        .map_err(StepFailure::at(Step::Create))?;
    users
        .field("login")
        .and_then(|field| field.set_client(&mut user, "test"))
        .map_err(StepFailure::at(Step::Create))?;

    tracing::info!("Step '{}'", Step::Persist);
    user.save(session)
        .await
        .map_err(StepFailure::at(Step::Persist))?;
    assertions.ok(user.id() >= 0, "Saved");

    tracing::info!("Step '{}'", Step::Reload);
    user.load(session, "name")
        .await
        .map_err(StepFailure::at(Step::Reload))?;
    assertions.ok(
        user.get_client("name") == Some(&json!("Test")),
        "Check get_client",
    );

    tracing::info!("Step '{}'", Step::Search);
    let found = users
        .find(
            session,
            &Domain::eq("id", user.id()),
            0,
            None,
            None,
            &Context::new(),
        )
        .await
        .map_err(StepFailure::at(Step::Search))?;
    assertions.ok(found.len() == 1, "Found 1");
    assertions.ok(
        found.first().map(Record::id) == Some(user.id()),
        "Found right one",
    );

    tracing::info!("Step '{}'", Step::Delete);
    users
        .delete(session, &found)
        .await
        .map_err(StepFailure::at(Step::Delete))?;
    let remaining = users
        .find(
            session,
            &Domain::eq("login", "test"),
            0,
            None,
            None,
            &Context::new(),
        )
        .await
        .map_err(StepFailure::at(Step::Delete))?;
    assertions.ok(remaining.is_empty(), "Deleted record not found");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let mut assertions = Assertions::new();
        assertions.expect(EXPECTED_ASSERTIONS);
        assertions.ok(true, "Unsaved");
        let report = ScenarioReport {
            database: "test_1".to_string(),
            assertions: assertions.done(),
            failure: Some(StepFailure {
                step: Step::Persist,
                error: RpcError::Transport("connection reset".to_string()),
            }),
        };
        let text = report.to_string();
        assert!(text.starts_with("database: test_1\n"));
        assert!(text.contains("ok 1 - Unsaved"));
        assert!(text.contains("aborted: step 'persist' failed: Transport error: connection reset"));
        assert!(text.ends_with("FAIL"));
        assert!(!report.passed());
    }
}
