//! Configuration reload tests against a running server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use samba_test_utils::*;
use serde_json::{json, Value};
use wiremock::MockServer;

#[tokio::test]
async fn test_reload_changes_defaults_for_new_requests() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestPluginServer::spawn(&provider.uri()).await?;

    let mut settings = server.config().settings.clone();
    settings.naming_scheme = "uuid".parse().unwrap();
    server.snapshots().reload(settings).await?;

    let body: Value = reqwest::Client::new()
        .get(format!("{}/api/v1/config", server.url()))
        .header("Mattermost-User-Id", TEST_USER_ID)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["naming_scheme"], "uuid");

    Ok(())
}

#[tokio::test]
async fn test_rejected_reload_keeps_serving_previous() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestPluginServer::spawn(&provider.uri()).await?;

    let mut settings = server.config().settings.clone();
    settings.max_participants = 0;
    settings.naming_scheme = "ask".parse().unwrap();
    assert!(server.snapshots().reload(settings).await.is_err());

    let body: Value = reqwest::Client::new()
        .get(format!("{}/api/v1/config", server.url()))
        .header("Mattermost-User-Id", TEST_USER_ID)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(
        body,
        json!({ "naming_scheme": "words", "embedded": false, "show_prejoin_page": false })
    );

    Ok(())
}
