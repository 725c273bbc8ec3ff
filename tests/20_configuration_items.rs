mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use cmdb_api::testing::{Reply, ScriptedExecutor};
use common::{caller_with_role, TestApp};

const AGENT: &str = "agent@example.com";

#[tokio::test]
async fn create_applies_defaults_and_returns_projection() {
    let executor = caller_with_role("agent").on("INSERT INTO \"ConfigurationItems\"", Reply::row(json!({ "CiId": 101 })));
    let app = TestApp::strict(executor);

    let (status, body) = app
        .call(Method::POST, "/api/configuration-items", Some(AGENT), Some(json!({ "ciName": "srv01", "ciType": "Server" })))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["CiId"], 101);
    assert_eq!(body["data"]["CiName"], "srv01");
    assert_eq!(body["data"]["Status"], "Active");
    assert_eq!(body["data"]["Environment"], "Production");

    let insert = &app.executor.matching("INSERT INTO")[0];
    assert!(insert.params().contains(&json!(AGENT)));
}

#[tokio::test]
async fn create_without_required_fields_never_inserts() {
    for body in [json!({ "ciType": "Server" }), json!({ "ciName": "srv01" }), json!({ "ciName": "", "ciType": "" })] {
        let app = TestApp::strict(caller_with_role("admin"));
        let (status, response) = app.call(Method::POST, "/api/configuration-items", Some(AGENT), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["code"], "VALIDATION_ERROR");
        assert!(!app.executor.executed("INSERT"));
    }
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::strict(caller_with_role("agent"));
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/configuration-items")
        .header(cmdb_api::config::DEFAULT_IDENTITY_HEADER, common::principal(AGENT))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{ not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn plain_users_cannot_write() {
    let app = TestApp::strict(caller_with_role("user"));
    let (status, body) = app
        .call(Method::POST, "/api/configuration-items", Some("user@example.com"), Some(json!({ "ciName": "a", "ciType": "b" })))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(!app.executor.executed("INSERT"));
}

#[tokio::test]
async fn list_combines_filters_and_orders_by_name() {
    let executor = ScriptedExecutor::new().on(
        "FROM \"ConfigurationItems\"",
        Reply::rows(vec![
            json!({ "CiId": 2, "CiName": "app01", "Status": "Active", "CiType": "Server", "SupportGroupName": "Ops" }),
            json!({ "CiId": 1, "CiName": "db01", "Status": "Active", "CiType": "Server", "SupportGroupName": null }),
        ]),
    );
    let app = TestApp::strict(executor);

    let (status, body) = app
        .call(Method::GET, "/api/configuration-items?status=Active&type=Server", Some("user@example.com"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let select = &app.executor.matching("FROM \"ConfigurationItems\"")[0];
    assert!(select.sql().contains("\"ci\".\"Status\" = $"));
    assert!(select.sql().contains("\"ci\".\"CiType\" = $"));
    assert!(select.sql().contains(" AND "));
    assert!(select.sql().ends_with("ORDER BY \"ci\".\"CiName\" ASC"));
    assert!(select.params().contains(&json!("Active")));
    assert!(select.params().contains(&json!("Server")));
    // Reads need no role lookup
    assert!(!app.executor.executed(common::ROLE_LOOKUP));
}

#[tokio::test]
async fn lookup_by_id_short_circuits_filters() {
    let app = TestApp::strict(ScriptedExecutor::new());
    let (status, body) = app
        .call(Method::GET, "/api/configuration-items/77?status=Retired", Some("user@example.com"), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    let select = &app.executor.statements()[0];
    assert!(select.sql().contains("\"ci\".\"CiId\" = $1"));
    assert!(!select.sql().contains("Status"));

    let (status, _) = app.call(Method::GET, "/api/configuration-items?id=abc", Some("user@example.com"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replace_overwrites_an_existing_item() {
    let executor = caller_with_role("agent")
        .on("SELECT \"CiId\" FROM", Reply::row(json!({ "CiId": 5 })))
        .on("UPDATE \"ConfigurationItems\"", Reply::Affected(1));
    let app = TestApp::strict(executor);

    let (status, body) = app
        .call(
            Method::PUT,
            "/api/configuration-items?id=5",
            Some(AGENT),
            Some(json!({ "ciName": "srv01", "ciType": "Server", "environment": "Staging" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["CiId"], 5);
    assert_eq!(body["data"]["Environment"], "Staging");
    let update = &app.executor.matching("UPDATE")[0];
    assert!(update.sql().contains("\"Owner\" = NULL"));
}

#[tokio::test]
async fn replace_of_unknown_item_is_not_found() {
    let app = TestApp::strict(caller_with_role("agent"));
    let (status, _) = app
        .call(Method::PUT, "/api/configuration-items/9", Some(AGENT), Some(json!({ "ciName": "a", "ciType": "b" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!app.executor.executed("UPDATE"));
}

#[tokio::test]
async fn delete_of_referenced_item_conflicts() {
    for (mappings, relationships) in [(1, 0), (0, 1), (3, 2)] {
        let executor = caller_with_role("agent")
            .on("SELECT \"CiId\" FROM", Reply::row(json!({ "CiId": 5 })))
            .on("ServiceCiMapping", Reply::row(json!({ "Mappings": mappings, "Relationships": relationships })));
        let app = TestApp::strict(executor);

        let (status, body) = app.call(Method::DELETE, "/api/configuration-items/5", Some(AGENT), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "CONFLICT");
        assert!(!app.executor.executed("DELETE FROM"));
    }
}

#[tokio::test]
async fn delete_of_orphaned_item_succeeds() {
    let executor = caller_with_role("admin")
        .on("SELECT \"CiId\" FROM", Reply::row(json!({ "CiId": 5 })))
        .on("ServiceCiMapping", Reply::row(json!({ "Mappings": 0, "Relationships": 0 })))
        .on("DELETE FROM", Reply::Affected(1));
    let app = TestApp::strict(executor);

    let (status, body) = app.call(Method::DELETE, "/api/configuration-items?id=5", Some(AGENT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);
    assert_eq!(app.executor.matching("DELETE FROM").len(), 1);
}

#[tokio::test]
async fn delete_requires_an_id() {
    let app = TestApp::strict(caller_with_role("agent"));
    let (status, body) = app.call(Method::DELETE, "/api/configuration-items", Some(AGENT), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field_errors"]["id"], "id is required");
}

#[tokio::test]
async fn store_failures_expose_details_only_in_development() {
    let failing = || ScriptedExecutor::new().on("FROM \"ConfigurationItems\"", Reply::Failure("relation lock timeout".into()));

    let dev = TestApp::development(failing());
    let (status, body) = dev.call(Method::GET, "/api/configuration-items", Some(AGENT), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert!(body["details"].as_str().is_some_and(|d| d.contains("lock timeout")));

    let strict = TestApp::strict(failing());
    let (status, body) = strict.call(Method::GET, "/api/configuration-items", Some(AGENT), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.get("details").is_none());
    assert!(!body["error"].as_str().unwrap_or_default().contains("lock timeout"));
}
