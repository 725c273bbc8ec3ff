mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use cmdb_api::testing::Reply;
use common::{caller_with_role, AuditLog, TestApp, ACTIVE_USER};

const ADMIN: &str = "admin@example.com";

fn target(email: &str, role: &str) -> Reply {
    Reply::row(json!({ "UserID": 8, "Email": email, "DisplayName": "Target User", "Role": role, "IsActive": true }))
}

// One test per binary: the capturing subscriber is thread-local and the
// audit callsite is shared.
#[tokio::test]
async fn impersonation_writes_one_audit_record_per_success() {
    let (log, _guard) = AuditLog::capture();

    let app = TestApp::strict(caller_with_role("admin").on(ACTIVE_USER, target("agent@example.com", "agent")));
    let (status, _) = app
        .call(Method::GET, "/api/user-roles/impersonate/agent@example.com", Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let records = log.records();
    assert_eq!(records.len(), 1, "records: {:?}", records);
    let record = &records[0];
    assert!(record.contains("audit"), "{}", record);
    assert!(record.contains(&format!("actor={}", ADMIN)), "{}", record);
    assert!(record.contains("target=") && record.contains("agent@example.com"), "{}", record);
    assert!(record.contains("timestamp="), "{}", record);

    // Refused impersonations leave no audit trail
    let app = TestApp::strict(caller_with_role("admin").on(ACTIVE_USER, target("boss@example.com", "admin")));
    let (status, _) = app
        .call(Method::GET, "/api/user-roles/impersonate/boss@example.com", Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(log.records().len(), 1);
    assert!(!log.records().iter().any(|r| r.contains("boss@example.com")));
}
