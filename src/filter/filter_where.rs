use serde_json::Value;

use super::error::FilterError;
use super::filter::{qualify, validate_identifier};

pub struct FilterWhere<'a> {
    qualifier: Option<&'a str>,
    param_values: Vec<Value>,
}

impl<'a> FilterWhere<'a> {
    fn new(qualifier: Option<&'a str>) -> Self {
        Self { qualifier, param_values: vec![] }
    }

    /// Render a WHERE body (without the keyword) and its parameters.
    /// Conditions at the same level are AND-combined.
    pub fn generate(where_data: &Value, qualifier: Option<&'a str>) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(qualifier);
        let sql = filter_where.build(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(String::new()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut sql_conditions = vec![];
        for (key, value) in obj {
            if key.starts_with('$') {
                return Err(FilterError::UnsupportedOperator(key.clone()));
            }
            validate_identifier(key)?;
            sql_conditions.push(self.build_equality(key, value)?);
        }
        Ok(sql_conditions.join(" AND "))
    }

    /// `{ column: value }` is equality; a `null` value means IS NULL.
    fn build_equality(&mut self, column: &str, value: &Value) -> Result<String, FilterError> {
        let column = qualify(self.qualifier, column);
        match value {
            Value::Null => Ok(format!("{} IS NULL", column)),
            Value::Object(_) | Value::Array(_) => {
                Err(FilterError::InvalidOperatorData(format!("{} expects a scalar value", column)))
            }
            scalar => Ok(format!("{} = {}", column, self.param(scalar.clone()))),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}
