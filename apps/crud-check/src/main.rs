//! Runs the CRUD acceptance scenario once and reports the outcome.
//!
//! Targets either a live server (`--url`) or an in-process mock server
//! (`--embedded`). Exits with status 1 when any assertion fails.

use std::process::ExitCode;

use clap::Parser;
use crud_scenario::{CrudScenario, ScenarioConfig};
use erp_mock_server::{MockServer, MockServerConfig};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the scenario runner.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the server under test
    #[arg(long, conflicts_with = "embedded", required_unless_present = "embedded")]
    url: Option<String>,

    /// Run against an in-process mock server
    #[arg(long)]
    embedded: bool,

    /// Login of the administrator account
    #[arg(long, default_value = "admin")]
    login: String,

    /// Server password, also used to log in
    #[arg(long, default_value = "admin")]
    password: String,

    /// Password given to the administrator of the new database
    #[arg(long, default_value = "admin")]
    admin_password: String,

    /// Language of the new database
    #[arg(long, default_value = "en_US")]
    language: String,

    /// Database name, defaults to a timestamped one
    #[arg(long)]
    database: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    timeout_ms: u64,

    /// Leave the session open when the scenario ends
    #[arg(long)]
    keep_session: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let embedded = if args.embedded {
        let config = MockServerConfig {
            super_password: args.password.clone(),
            default_language: args.language.clone(),
            ..Default::default()
        };
        let handle = MockServer::bind("127.0.0.1:0".parse()?, config)
            .await?
            .spawn()?;
        tracing::info!("Embedded mock server at {}", handle.base_url());
        Some(handle)
    } else {
        None
    };

    let server_url = match (&embedded, args.url) {
        (Some(handle), _) => handle.base_url(),
        (None, Some(url)) => url,
        (None, None) => anyhow::bail!("either --url or --embedded is required"),
    };

    let scenario = CrudScenario::new(ScenarioConfig {
        server_url,
        login: args.login,
        password: args.password,
        admin_password: args.admin_password,
        language: args.language,
        database: args.database,
        request_timeout_ms: args.timeout_ms,
        logout_on_finish: !args.keep_session,
    });
    let report = scenario.run().await;
    println!("{}", report);
    tracing::info!(
        "Scenario on '{}' {}",
        report.database,
        if report.passed() { "passed" } else { "failed" }
    );

    if let Some(handle) = embedded {
        handle.shutdown().await;
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
