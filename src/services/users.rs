use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::identity::Identity;
use crate::database::models::user::{
    NewUser, Role, UserUpdate, DISPLAY_NAME, EMAIL, EXTERNAL_ID, IS_ACTIVE, MEMBERSHIP_TABLE, ROLE, TABLE, USER_ID,
};
use crate::database::{DatabaseError, InsertBuilder, QueryExecutor, Row, Statement, UpdateBuilder};
use crate::filter::{Filter, FilterData};

use super::error::ServiceError;

const ACTIVE_BY_EMAIL: &str = r#"SELECT "UserID", "Email", "ExternalID", "DisplayName", "FirstName", "LastName", "Department", "JobTitle", "Role", "IsActive" FROM "Users" WHERE LOWER("Email") = LOWER($1) AND "IsActive" = TRUE"#;

pub struct UserService<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> UserService<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Role of the active user matching the identity by email or external id.
    ///
    /// An unrecognized stored role reads as no role at all.
    pub async fn stored_role(&self, identity: &Identity) -> Result<Option<Role>, DatabaseError> {
        let statement = Statement::query(
            r#"SELECT "Role" FROM "Users" WHERE (LOWER("Email") = LOWER($1) OR "ExternalID" = $2) AND "IsActive" = TRUE LIMIT 1"#,
        )
        .bind(identity.email.as_str())
        .bind(identity.external_id.clone());

        let Some(row) = self.executor.fetch_optional(&statement).await? else {
            return Ok(None);
        };
        let stored = row.get(ROLE).and_then(Value::as_str).unwrap_or_default();
        let role = Role::from_stored(stored);
        if role.is_none() {
            warn!(email = %identity.email, stored, "Ignoring unrecognized stored role");
        }
        Ok(role)
    }

    pub async fn find_active(&self, email: &str) -> Result<Option<Row>, ServiceError> {
        let statement = Statement::query(ACTIVE_BY_EMAIL).bind(email);
        Ok(self.executor.fetch_optional(&statement).await?.map(normalize_role))
    }

    /// The caller's own role record. Callers without a row read as an
    /// unregistered plain user.
    pub async fn own_role(&self, identity: &Identity) -> Result<Value, ServiceError> {
        let statement = Statement::query(
            r#"SELECT "UserID", "Email", "DisplayName", "Role" FROM "Users" WHERE (LOWER("Email") = LOWER($1) OR "ExternalID" = $2) AND "IsActive" = TRUE LIMIT 1"#,
        )
        .bind(identity.email.as_str())
        .bind(identity.external_id.clone());

        let Some(row) = self.executor.fetch_optional(&statement).await? else {
            return Ok(role_summary(&identity.email, None, Role::User, false));
        };
        let role = row.get(ROLE).and_then(Value::as_str).and_then(Role::from_stored).unwrap_or(Role::User);
        let email = row.get(EMAIL).and_then(Value::as_str).unwrap_or(&identity.email);
        let display_name = row.get(DISPLAY_NAME).and_then(Value::as_str);
        Ok(role_summary(email, display_name, role, true))
    }

    /// Every user ordered by email; inactive rows only on request.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Row>, ServiceError> {
        let mut filter = Filter::new(TABLE)?;
        filter.assign(FilterData {
            where_clause: (!include_inactive).then(|| json!({ IS_ACTIVE: true })),
            order: Some(json!(format!("{} asc", EMAIL))),
            ..Default::default()
        })?;

        let statement: Statement = filter.to_sql()?.into();
        let rows = self.executor.fetch_all(&statement).await?;
        Ok(rows.into_iter().map(normalize_role).collect())
    }

    /// Insert a user, plus one group membership per supplied group for agents.
    ///
    /// With `atomic` the user and memberships commit together. Otherwise
    /// memberships are best-effort: a failed one is logged and skipped.
    pub async fn create(&self, user: &NewUser, actor: &str, atomic: bool) -> Result<Value, ServiceError> {
        let duplicate = Statement::query(r#"SELECT "UserID" FROM "Users" WHERE LOWER("Email") = LOWER($1)"#)
            .bind(user.email.as_str());
        if self.executor.fetch_optional(&duplicate).await?.is_some() {
            return Err(ServiceError::Conflict(format!("A user with email {} already exists", user.email)));
        }

        let insert = InsertBuilder::new(TABLE)
            .value(EMAIL, user.email.as_str())
            .value(EXTERNAL_ID, user.external_id.clone())
            .value(DISPLAY_NAME, user.display_name.as_str())
            .value("FirstName", user.first_name.clone())
            .value("LastName", user.last_name.clone())
            .value("Department", user.department.clone())
            .value("JobTitle", user.job_title.clone())
            .value(ROLE, user.role.as_str())
            .value(IS_ACTIVE, true)
            .value("CreatedBy", actor)
            .value("ModifiedBy", actor)
            .expression("CreatedDate", "NOW()")
            .expression("ModifiedDate", "NOW()")
            .returning(&[USER_ID])
            .build()?;

        let group_ids: &[i64] = if user.role == Role::Agent { &user.assignment_group_ids } else { &[] };
        let mut memberships = Vec::with_capacity(group_ids.len());
        for group_id in group_ids {
            memberships.push(
                InsertBuilder::new(MEMBERSHIP_TABLE)
                    .value("GroupId", *group_id)
                    .value("UserEmail", user.email.as_str())
                    .value("AddedBy", actor)
                    .expression("AddedDate", "NOW()")
                    .build()?,
            );
        }

        let (user_row, added) = if atomic {
            let mut batch = Vec::with_capacity(memberships.len() + 1);
            batch.push(insert);
            batch.extend(memberships);
            let outcomes = self.executor.run_atomic(&batch).await?;
            let row = outcomes.into_iter().next().and_then(|o| o.rows.into_iter().next());
            (row, group_ids.to_vec())
        } else {
            let row = self.executor.fetch_optional(&insert).await?;
            let mut added = Vec::with_capacity(memberships.len());
            for (group_id, statement) in group_ids.iter().zip(&memberships) {
                match self.executor.execute(statement).await {
                    Ok(_) => added.push(*group_id),
                    Err(e) => warn!(email = %user.email, group_id, error = %e, "Failed to add assignment group membership"),
                }
            }
            (row, added)
        };

        let user_id = user_row
            .and_then(|row| row.get(USER_ID).cloned())
            .ok_or_else(|| DatabaseError::QueryError("insert returned no identity".to_string()))?;

        info!(user_id = %user_id, email = %user.email, role = %user.role, actor, "Created user");
        Ok(json!({
            USER_ID: user_id,
            "email": user.email,
            "displayName": user.display_name,
            "role": user.role,
            "assignmentGroupIds": added,
        }))
    }

    /// Write only the fields present in the update.
    pub async fn update(&self, update: &UserUpdate, actor: &str) -> Result<Value, ServiceError> {
        let existing = self
            .find_active(&update.email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", update.email)))?;
        let user_id = existing.get(USER_ID).cloned().unwrap_or(Value::Null);

        let statement = UpdateBuilder::new(TABLE)
            .set_opt(DISPLAY_NAME, update.display_name.clone())
            .set_opt("FirstName", update.first_name.clone())
            .set_opt("LastName", update.last_name.clone())
            .set_opt("Department", update.department.clone())
            .set_opt("JobTitle", update.job_title.clone())
            .set_opt(ROLE, update.role.map(Role::as_str))
            .set("ModifiedBy", actor)
            .expression("ModifiedDate", "NOW()")
            .where_eq(USER_ID, user_id.clone())
            .returning(&[USER_ID, EMAIL, DISPLAY_NAME, ROLE])
            .build()?;

        let row = self
            .executor
            .fetch_optional(&statement)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", update.email)))?;

        info!(user_id = %user_id, email = %update.email, actor, "Updated user");
        Ok(Value::Object(normalize_role(row)))
    }

    /// Soft delete. Nobody may deactivate their own account.
    /// Refuse a deactivation aimed at the caller's own account.
    pub fn ensure_not_self(email: &str, caller: &Identity) -> Result<(), ServiceError> {
        if email.trim().eq_ignore_ascii_case(caller.email.trim()) {
            return Err(ServiceError::Rejected("You cannot deactivate your own account".to_string()));
        }
        Ok(())
    }

    pub async fn deactivate(&self, email: &str, caller: &Identity) -> Result<Value, ServiceError> {
        Self::ensure_not_self(email, caller)?;

        let existing = self
            .find_active(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", email)))?;
        let user_id = existing.get(USER_ID).cloned().unwrap_or(Value::Null);

        let statement = UpdateBuilder::new(TABLE)
            .set(IS_ACTIVE, false)
            .set("ModifiedBy", caller.email.as_str())
            .expression("ModifiedDate", "NOW()")
            .where_eq(USER_ID, user_id.clone())
            .build()?;
        if self.executor.execute(&statement).await? == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", email)));
        }

        info!(user_id = %user_id, email, actor = %caller.email, "Deactivated user");
        Ok(json!({ USER_ID: user_id, "email": email, "isActive": false }))
    }

    /// Effective role of another user, for an admin acting on their behalf.
    /// Administrators cannot be impersonated.
    pub async fn impersonate(&self, email: &str, actor: &Identity) -> Result<Value, ServiceError> {
        let target = self
            .find_active(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", email)))?;

        let role = target.get(ROLE).and_then(Value::as_str).and_then(Role::from_stored).unwrap_or(Role::User);
        if role.is_admin() {
            warn!(actor = %actor.email, target = email, "Refused impersonation of an administrator");
            return Err(ServiceError::Forbidden("Cannot impersonate another administrator".to_string()));
        }

        let target_email = target.get(EMAIL).and_then(Value::as_str).unwrap_or(email);
        let now = Utc::now();
        info!(
            target: "audit",
            actor = %actor.email,
            target = target_email,
            timestamp = %now.to_rfc3339(),
            "Impersonation started"
        );

        let mut data = role_summary(target_email, target.get(DISPLAY_NAME).and_then(Value::as_str), role, true);
        if let Value::Object(ref mut map) = data {
            map.remove("registered");
            map.insert("impersonatedBy".to_string(), json!(actor.email));
            map.insert("impersonatedAt".to_string(), json!(now));
        }
        Ok(data)
    }
}

fn role_summary(email: &str, display_name: Option<&str>, role: Role, registered: bool) -> Value {
    json!({
        "email": email,
        "displayName": display_name,
        "role": role,
        "isAgent": role.is_agent(),
        "isAdmin": role.is_admin(),
        "registered": registered,
    })
}

/// Rewrite a recognized stored role in its canonical lowercase form.
fn normalize_role(mut row: Row) -> Row {
    if let Some(role) = row.get(ROLE).and_then(Value::as_str).and_then(Role::from_stored) {
        row.insert(ROLE.to_string(), json!(role));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedExecutor};
    use crate::validation;

    fn caller(email: &str) -> Identity {
        Identity { email: email.to_string(), external_id: None, provider: None, development: false }
    }

    fn active(email: &str, role: &str) -> Reply {
        Reply::row(json!({ "UserID": 7, "Email": email, "DisplayName": "Some One", "Role": role, "IsActive": true }))
    }

    #[tokio::test]
    async fn stored_role_is_normalized() {
        let executor = ScriptedExecutor::new().on("SELECT \"Role\"", Reply::row(json!({ "Role": "ADMIN" })));
        let role = UserService::new(&executor).stored_role(&caller("a@example.com")).await.unwrap();
        assert_eq!(role, Some(Role::Admin));

        let executor = ScriptedExecutor::new().on("SELECT \"Role\"", Reply::row(json!({ "Role": "owner" })));
        let role = UserService::new(&executor).stored_role(&caller("a@example.com")).await.unwrap();
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn unregistered_caller_reads_as_user() {
        let executor = ScriptedExecutor::new();
        let data = UserService::new(&executor).own_role(&caller("new@example.com")).await.unwrap();
        assert_eq!(data["role"], "user");
        assert_eq!(data["registered"], false);
        assert_eq!(data["isAgent"], false);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_before_insert() {
        let executor = ScriptedExecutor::new().on("SELECT \"UserID\" FROM \"Users\"", Reply::row(json!({ "UserID": 1 })));
        let user = validation::new_user(json!({ "email": "x@example.com", "displayName": "X" })).unwrap();
        let err = UserService::new(&executor).create(&user, "admin@example.com", false).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(!executor.executed("INSERT"));
    }

    #[tokio::test]
    async fn agent_memberships_are_best_effort() {
        let executor = ScriptedExecutor::new()
            .on("INSERT INTO \"Users\"", Reply::row(json!({ "UserID": 11 })))
            .once("INSERT INTO \"AssignmentGroupMembers\"", Reply::Failure("fk violation".into()))
            .on("INSERT INTO \"AssignmentGroupMembers\"", Reply::Affected(1));
        let user = validation::new_user(json!({
            "email": "agent@example.com",
            "displayName": "Agent",
            "role": "agent",
            "assignmentGroupIds": [3, 4]
        }))
        .unwrap();

        let data = UserService::new(&executor).create(&user, "admin@example.com", false).await.unwrap();
        assert_eq!(data["UserID"], 11);
        assert_eq!(data["assignmentGroupIds"], json!([4]));
        assert_eq!(executor.matching("AssignmentGroupMembers").len(), 2);
        assert!(executor.atomic_batches().is_empty());
    }

    #[tokio::test]
    async fn atomic_create_runs_one_batch() {
        let executor = ScriptedExecutor::new().on("INSERT INTO \"Users\"", Reply::row(json!({ "UserID": 12 })));
        let user = validation::new_user(json!({
            "email": "agent@example.com",
            "displayName": "Agent",
            "role": "agent",
            "assignmentGroupIds": [3, 4]
        }))
        .unwrap();

        UserService::new(&executor).create(&user, "admin@example.com", true).await.unwrap();
        assert_eq!(executor.atomic_batches(), vec![3]);
    }

    #[tokio::test]
    async fn non_agents_get_no_memberships() {
        let executor = ScriptedExecutor::new().on("INSERT INTO \"Users\"", Reply::row(json!({ "UserID": 13 })));
        let user = validation::new_user(json!({
            "email": "u@example.com",
            "displayName": "U",
            "assignmentGroupIds": [3]
        }))
        .unwrap();

        UserService::new(&executor).create(&user, "admin@example.com", false).await.unwrap();
        assert!(!executor.executed("AssignmentGroupMembers"));
    }

    #[tokio::test]
    async fn partial_update_touches_only_supplied_fields() {
        let executor = ScriptedExecutor::new()
            .on("UPDATE \"Users\"", Reply::row(json!({ "UserID": 7, "Email": "x@example.com", "DisplayName": "New", "Role": "User" })))
            .on("FROM \"Users\"", active("x@example.com", "user"));
        let update = validation::user_update(json!({ "email": "x@example.com", "displayName": "New" })).unwrap();

        let data = UserService::new(&executor).update(&update, "admin@example.com").await.unwrap();
        assert_eq!(data["Role"], "user");

        let statement = executor.matching("UPDATE")[0].clone();
        assert!(statement.sql().starts_with(
            "UPDATE \"Users\" SET \"DisplayName\" = $1, \"ModifiedBy\" = $2, \"ModifiedDate\" = NOW() WHERE \"UserID\" = $3"
        ));
        assert_eq!(statement.params(), &[json!("New"), json!("admin@example.com"), json!(7)]);
    }

    #[tokio::test]
    async fn self_deactivation_is_rejected_without_queries() {
        let executor = ScriptedExecutor::new();
        let err = UserService::new(&executor)
            .deactivate("Admin@Example.com", &caller("admin@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn deactivation_is_soft() {
        let executor = ScriptedExecutor::new()
            .on("UPDATE \"Users\"", Reply::Affected(1))
            .on("FROM \"Users\"", active("x@example.com", "user"));
        UserService::new(&executor).deactivate("x@example.com", &caller("admin@example.com")).await.unwrap();

        let statement = executor.matching("UPDATE")[0].clone();
        assert!(statement.sql().starts_with("UPDATE \"Users\" SET \"IsActive\" = $1"));
        assert_eq!(statement.params()[0], json!(false));
        assert!(!executor.executed("DELETE"));
    }

    #[tokio::test]
    async fn administrators_cannot_be_impersonated() {
        let executor = ScriptedExecutor::new().on("FROM \"Users\"", active("boss@example.com", "Admin"));
        let err = UserService::new(&executor)
            .impersonate("boss@example.com", &caller("admin@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn impersonation_reports_capabilities() {
        let executor = ScriptedExecutor::new().on("FROM \"Users\"", active("agent@example.com", "agent"));
        let data = UserService::new(&executor)
            .impersonate("AGENT@example.com", &caller("admin@example.com"))
            .await
            .unwrap();
        assert_eq!(data["email"], "agent@example.com");
        assert_eq!(data["role"], "agent");
        assert_eq!(data["isAgent"], true);
        assert_eq!(data["isAdmin"], false);
        assert_eq!(data["impersonatedBy"], "admin@example.com");
        assert!(data.get("registered").is_none());
    }
}
