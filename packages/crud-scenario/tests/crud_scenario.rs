//! End-to-end runs of the CRUD scenario against the in-process server.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crud_scenario::{CrudScenario, ScenarioConfig, Step, EXPECTED_ASSERTIONS};
use erp_mock_server::{MockServer, MockServerConfig, MockServerHandle};

async fn spawn_server() -> anyhow::Result<MockServerHandle> {
    let server = MockServer::bind("127.0.0.1:0".parse()?, MockServerConfig::default()).await?;
    Ok(server.spawn()?)
}

fn config_for(server: &MockServerHandle) -> ScenarioConfig {
    ScenarioConfig {
        server_url: server.base_url(),
        request_timeout_ms: 5000,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_crud_scenario_passes() -> anyhow::Result<()> {
    let server = spawn_server().await?;
    let scenario = CrudScenario::new(config_for(&server));

    let report = scenario.run().await;

    assert!(report.passed(), "{}", report);
    assert!(report.failure.is_none());
    assert!(report.database.starts_with("test_"));
    assert_eq!(report.assertions.executed(), EXPECTED_ASSERTIONS);
    let labels: Vec<&str> = report
        .assertions
        .outcomes
        .iter()
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec![
            "Unsaved",
            "Saved",
            "Check get_client",
            "Found 1",
            "Found right one",
            "Deleted record not found",
        ]
    );

    // Only the seeded administrator remains.
    let remaining = server.registry().with_database(&report.database, |db| {
        db.model("res.user")?
            .search(&json!([["login", "=", "test"]]), 0, None, &Value::Null)
    })?;
    assert!(remaining.is_empty());
    assert_eq!(
        server.registry().list_databases(),
        vec![report.database.clone()]
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_scenario_runs_twice_on_distinct_databases() -> anyhow::Result<()> {
    let server = spawn_server().await?;
    let first = CrudScenario::new(ScenarioConfig {
        database: Some("crud_a".to_string()),
        ..config_for(&server)
    })
    .run()
    .await;
    let second = CrudScenario::new(ScenarioConfig {
        database: Some("crud_b".to_string()),
        ..config_for(&server)
    })
    .run()
    .await;

    assert!(first.passed(), "{}", first);
    assert!(second.passed(), "{}", second);
    assert_eq!(
        server.registry().list_databases(),
        vec!["crud_a".to_string(), "crud_b".to_string()]
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_existing_database_aborts_at_provision() -> anyhow::Result<()> {
    let server = spawn_server().await?;
    server
        .registry()
        .create_database("taken", "admin", "en_US", "admin")?;
    let scenario = CrudScenario::new(ScenarioConfig {
        database: Some("taken".to_string()),
        ..config_for(&server)
    });

    let report = scenario.run().await;

    let failure = report.failure.as_ref().expect("provision should fail");
    assert_eq!(failure.step, Step::Provision);
    assert_eq!(report.assertions.executed(), 0);
    assert!(report.assertions.concluded);
    assert!(!report.passed());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_wrong_password_aborts_at_authenticate() -> anyhow::Result<()> {
    let server = spawn_server().await?;
    // The server password must match for provisioning; the user password
    // differs from the admin password given to the new database.
    let scenario = CrudScenario::new(ScenarioConfig {
        admin_password: "other".to_string(),
        ..config_for(&server)
    });

    let report = scenario.run().await;

    let failure = report.failure.as_ref().expect("login should fail");
    assert_eq!(failure.step, Step::Authenticate);
    assert!(report.assertions.count_mismatch());
    assert!(!report.passed());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_concludes() -> anyhow::Result<()> {
    let server = spawn_server().await?;
    let url = server.base_url();
    server.shutdown().await;

    let scenario = CrudScenario::new(ScenarioConfig {
        server_url: url,
        request_timeout_ms: 1000,
        ..Default::default()
    });
    let report = tokio::time::timeout(Duration::from_secs(10), scenario.run()).await?;

    let failure = report.failure.as_ref().expect("transport should fail");
    assert_eq!(failure.step, Step::Provision);
    assert!(report.assertions.concluded);
    assert_eq!(report.assertions.executed(), 0);
    assert!(!report.passed());
    Ok(())
}
