use serde_json::{json, Map, Value};
use tracing::info;

use crate::database::models::configuration_item::{
    ConfigurationItemFields, ConfigurationItemFilter, ALIAS, ASSIGNMENT_GROUP_ALIAS, ASSIGNMENT_GROUP_TABLE, CI_ID,
    CI_NAME, CI_TYPE, ENVIRONMENT, STATUS, SUPPORT_GROUP_ID, TABLE,
};
use crate::database::{DatabaseError, InsertBuilder, QueryExecutor, Row, Statement, UpdateBuilder};
use crate::filter::{Filter, FilterData, FilterJoin};

use super::error::ServiceError;

pub struct ConfigurationItemService<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> ConfigurationItemService<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Items joined with their support group name.
    fn select() -> Result<Filter, ServiceError> {
        let mut filter = Filter::new(TABLE)?;
        filter.alias(ALIAS)?;
        filter.join(FilterJoin {
            table: ASSIGNMENT_GROUP_TABLE.to_string(),
            alias: ASSIGNMENT_GROUP_ALIAS.to_string(),
            column: "GroupId".to_string(),
            base_column: SUPPORT_GROUP_ID.to_string(),
            select: vec![("GroupName".to_string(), "SupportGroupName".to_string())],
        })?;
        Ok(filter)
    }

    /// List items matching every supplied filter, ordered by name.
    pub async fn list(&self, criteria: &ConfigurationItemFilter) -> Result<Vec<Row>, ServiceError> {
        let mut conditions = Map::new();
        for (column, value) in [
            (STATUS, &criteria.status),
            (CI_TYPE, &criteria.ci_type),
            (ENVIRONMENT, &criteria.environment),
        ] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                conditions.insert(column.to_string(), json!(v));
            }
        }

        let mut filter = Self::select()?;
        filter.assign(FilterData {
            where_clause: (!conditions.is_empty()).then_some(Value::Object(conditions)),
            order: Some(json!(format!("{} asc", CI_NAME))),
            ..Default::default()
        })?;

        let statement: Statement = filter.to_sql()?.into();
        Ok(self.executor.fetch_all(&statement).await?)
    }

    pub async fn get(&self, ci_id: i64) -> Result<Row, ServiceError> {
        let mut filter = Self::select()?;
        filter.where_clause(json!({ CI_ID: ci_id }))?;

        let statement: Statement = filter.to_sql()?.into();
        self.executor
            .fetch_optional(&statement)
            .await?
            .ok_or_else(|| not_found(ci_id))
    }

    pub async fn create(&self, fields: &ConfigurationItemFields, actor: &str) -> Result<Value, ServiceError> {
        let statement = fields
            .columns()
            .into_iter()
            .fold(InsertBuilder::new(TABLE), |insert, (column, value)| insert.value(column, value))
            .value("CreatedBy", actor)
            .value("ModifiedBy", actor)
            .expression("CreatedDate", "NOW()")
            .expression("ModifiedDate", "NOW()")
            .returning(&[CI_ID])
            .build()?;

        let row = self
            .executor
            .fetch_optional(&statement)
            .await?
            .ok_or_else(|| DatabaseError::QueryError("insert returned no identity".to_string()))?;
        let ci_id = row.get(CI_ID).cloned().unwrap_or(Value::Null);

        info!(ci_id = %ci_id, ci_name = %fields.ci_name, actor, "Created configuration item");
        Ok(fields.projection(ci_id))
    }

    /// Overwrite every mutable column; absent optionals are cleared.
    pub async fn replace(&self, ci_id: i64, fields: &ConfigurationItemFields, actor: &str) -> Result<Value, ServiceError> {
        if !self.exists(ci_id).await? {
            return Err(not_found(ci_id));
        }

        let statement = fields
            .columns()
            .into_iter()
            .fold(UpdateBuilder::new(TABLE), |update, (column, value)| update.set(column, value))
            .set("ModifiedBy", actor)
            .expression("ModifiedDate", "NOW()")
            .where_eq(CI_ID, ci_id)
            .build()?;
        self.executor.execute(&statement).await?;

        info!(ci_id, actor, "Updated configuration item");
        Ok(fields.projection(json!(ci_id)))
    }

    /// Hard delete, refused while any service mapping or relationship
    /// references the item.
    pub async fn delete(&self, ci_id: i64, actor: &str) -> Result<Value, ServiceError> {
        if !self.exists(ci_id).await? {
            return Err(not_found(ci_id));
        }

        let (mappings, relationships) = self.reference_counts(ci_id).await?;
        if mappings > 0 || relationships > 0 {
            return Err(ServiceError::Conflict(format!(
                "Cannot delete configuration item {}: it is referenced by {} service mapping(s) and {} relationship(s)",
                ci_id, mappings, relationships
            )));
        }

        let statement = Statement::command(r#"DELETE FROM "ConfigurationItems" WHERE "CiId" = $1"#).bind(ci_id);
        if self.executor.execute(&statement).await? == 0 {
            return Err(not_found(ci_id));
        }

        info!(ci_id, actor, "Deleted configuration item");
        Ok(json!({ CI_ID: ci_id, "deleted": true }))
    }

    async fn exists(&self, ci_id: i64) -> Result<bool, ServiceError> {
        let statement = Statement::query(r#"SELECT "CiId" FROM "ConfigurationItems" WHERE "CiId" = $1"#).bind(ci_id);
        Ok(self.executor.fetch_optional(&statement).await?.is_some())
    }

    async fn reference_counts(&self, ci_id: i64) -> Result<(i64, i64), ServiceError> {
        let statement = Statement::query(
            r#"SELECT (SELECT COUNT(*) FROM "ServiceCiMapping" WHERE "CiId" = $1) AS "Mappings", (SELECT COUNT(*) FROM "CiRelationships" WHERE "SourceCiId" = $1 OR "TargetCiId" = $1) AS "Relationships""#,
        )
        .bind(ci_id);

        let row = self.executor.fetch_optional(&statement).await?.unwrap_or_default();
        let count = |key: &str| row.get(key).and_then(Value::as_i64).unwrap_or(0);
        Ok((count("Mappings"), count("Relationships")))
    }
}

fn not_found(ci_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Configuration item {} not found", ci_id))
}
