use serde_json::json;

use crate::database::models::ci_type::{IS_ACTIVE, SORT_ORDER, TABLE, TYPE_NAME};
use crate::database::{QueryExecutor, Row, Statement};
use crate::filter::{Filter, FilterData};

use super::error::ServiceError;

pub struct CiTypeService<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> CiTypeService<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Active catalog entries in display order.
    pub async fn list(&self) -> Result<Vec<Row>, ServiceError> {
        let mut filter = Filter::new(TABLE)?;
        filter.assign(FilterData {
            where_clause: Some(json!({ IS_ACTIVE: true })),
            order: Some(json!([format!("{} asc", SORT_ORDER), format!("{} asc", TYPE_NAME)])),
            ..Default::default()
        })?;

        let statement: Statement = filter.to_sql()?.into();
        Ok(self.executor.fetch_all(&statement).await?)
    }
}
