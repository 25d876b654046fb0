//! Client calls against the in-process server.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use erp_mock_server::{MockServer, MockServerConfig, MockServerHandle};
use erp_rpc::{ClientConfig, Connection, Context, Domain, Model, Operator, RpcError, Session};

struct Fixture {
    server: MockServerHandle,
    session: Session,
    users: Model,
}

async fn fixture(database: &str) -> anyhow::Result<Fixture> {
    let server = MockServer::bind("127.0.0.1:0".parse()?, MockServerConfig::default())
        .await?
        .spawn()?;
    let connection = Arc::new(Connection::new(&ClientConfig {
        server_url: server.base_url(),
        request_timeout_ms: 5000,
        ..Default::default()
    })?);
    connection
        .create_database(database, "admin", "en_US", "admin")
        .await?;
    let session = Session::login(connection, database, "admin", "admin", "en_US").await?;
    let mut users = Model::new("res.user");
    users.introspect(&session).await?;
    Ok(Fixture {
        server,
        session,
        users,
    })
}

#[tokio::test]
async fn test_server_level_calls() -> anyhow::Result<()> {
    let f = fixture("server_calls").await?;
    let connection = f.session.connection();

    assert!(!connection.server_version().await?.is_empty());
    assert_eq!(
        connection.list_databases().await?,
        vec!["server_calls".to_string()]
    );
    assert_eq!(f.session.user_id(), 1);
    assert_eq!(f.session.context().get("language"), Some(&json!("en_US")));

    let err = connection
        .create_database("server_calls", "admin", "en_US", "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Server { ref kind, .. } if kind == "DatabaseOperationalError"));

    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_save_writes_only_modified_fields() -> anyhow::Result<()> {
    let f = fixture("save_write").await?;
    let mut user = f.users.new_record();
    f.users.field("name")?.set_client(&mut user, "Before")?;
    f.users.field("login")?.set_client(&mut user, "writer")?;
    f.users.field("email")?.set_client(&mut user, "w@example.com")?;
    user.save(&f.session).await?;
    let id = user.id();
    assert!(id >= 0);
    assert_eq!(user.modified_fields().count(), 0);

    f.users.field("name")?.set_client(&mut user, "After")?;
    user.save(&f.session).await?;
    assert_eq!(user.id(), id);

    user.reload(&f.session).await?;
    assert_eq!(user.get_client("name"), Some(&json!("After")));
    assert_eq!(user.get_client("email"), Some(&json!("w@example.com")));
    assert!(user.is_loaded("login"));

    // A save with nothing modified sends no call and keeps the record intact.
    user.save(&f.session).await?;
    assert_eq!(user.id(), id);

    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_find_with_order_limit_and_count() -> anyhow::Result<()> {
    let f = fixture("find_order").await?;
    for (name, login) in [("Carol", "carol"), ("Alice", "alice"), ("Bob", "bob")] {
        let mut user = f.users.new_record();
        f.users.field("name")?.set_client(&mut user, name)?;
        f.users.field("login")?.set_client(&mut user, login)?;
        user.save(&f.session).await?;
    }

    let not_admin = Domain::leaf("login", Operator::NotEq, "admin");
    let found = f
        .users
        .find(
            &f.session,
            &not_admin,
            0,
            Some(2),
            Some(&[("name", "ASC")]),
            &Context::new(),
        )
        .await?;
    let mut names = Vec::new();
    for mut record in found {
        assert!(record.is_saved());
        record.load(&f.session, "name").await?;
        names.push(record.get_client("name").cloned());
    }
    assert_eq!(names, vec![Some(json!("Alice")), Some(json!("Bob"))]);

    assert_eq!(f.users.search_count(&f.session, &not_admin).await?, 3);
    let either = Domain::or(vec![Domain::eq("login", "bob"), Domain::eq("login", "carol")]);
    assert_eq!(f.users.search_count(&f.session, &either).await?, 2);

    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_server_faults_and_client_checks() -> anyhow::Result<()> {
    let f = fixture("faults").await?;

    let mut duplicate = f.users.new_record();
    f.users.field("name")?.set_client(&mut duplicate, "Admin again")?;
    f.users.field("login")?.set_client(&mut duplicate, "admin")?;
    let err = duplicate.save(&f.session).await.unwrap_err();
    assert!(matches!(err, RpcError::Server { ref kind, .. } if kind == "UserError"));
    assert!(!duplicate.is_saved());

    let mut unsaved = f.users.new_record();
    assert!(matches!(
        unsaved.load(&f.session, "name").await,
        Err(RpcError::UnsavedRecord { .. })
    ));
    assert!(matches!(
        f.users.delete(&f.session, &[unsaved]).await,
        Err(RpcError::UnsavedRecord { .. })
    ));
    assert!(matches!(
        f.users.field("nickname"),
        Err(RpcError::FieldNotFound { .. })
    ));

    let err = f
        .users
        .execute(&f.session, "unlink_all", Vec::new(), &Context::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Server { .. }));

    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_expired_session_is_renewed() -> anyhow::Result<()> {
    let f = fixture("renewal").await?;
    let before = f.session.authorization();

    f.server.expire_sessions();
    let ids = f
        .users
        .find(
            &f.session,
            &Domain::eq("login", "admin"),
            0,
            None,
            None,
            &Context::new(),
        )
        .await?;

    assert_eq!(ids.len(), 1);
    assert_ne!(f.session.authorization(), before);

    f.session.logout().await?;
    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_bad_login_is_a_server_fault() -> anyhow::Result<()> {
    let f = fixture("bad_login").await?;
    let err = Session::login(
        Arc::clone(f.session.connection()),
        "bad_login",
        "admin",
        "wrong",
        "en_US",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RpcError::Server { ref kind, .. } if kind == "LoginException"));

    f.server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_token_keeps_server_message() -> anyhow::Result<()> {
    let f = fixture("rejected").await?;
    let forged = erp_rpc::session::authorization_header("admin", 1, "forged");

    let err = f
        .session
        .connection()
        .call(
            Some("rejected"),
            "model.res.user.search_count",
            &[json!([]), json!({})],
            Some(&forged),
        )
        .await
        .unwrap_err();
    match err {
        RpcError::Unauthorized(message) => assert!(message.contains("Invalid session")),
        other => panic!("expected Unauthorized, got {:?}", other),
    }

    f.server.shutdown().await;
    Ok(())
}
