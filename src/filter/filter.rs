use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

/// LEFT JOIN contributing extra columns to a list query.
#[derive(Debug, Clone)]
pub struct FilterJoin {
    pub table: String,
    pub alias: String,
    /// Column on the joined table
    pub column: String,
    /// Column on the base table it must equal
    pub base_column: String,
    /// (joined column, output name)
    pub select: Vec<(String, String)>,
}

pub struct Filter {
    table_name: String,
    alias: Option<String>,
    joins: Vec<FilterJoin>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        validate_identifier(&table_name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)))?;
        Ok(Self {
            table_name,
            alias: None,
            joins: vec![],
            where_data: None,
            order_data: vec![],
        })
    }

    /// Alias the base table; unqualified columns in WHERE and ORDER BY then
    /// resolve against it.
    pub fn alias(&mut self, alias: impl Into<String>) -> Result<&mut Self, FilterError> {
        let alias = alias.into();
        validate_identifier(&alias)?;
        self.alias = Some(alias);
        Ok(self)
    }

    pub fn join(&mut self, join: FilterJoin) -> Result<&mut Self, FilterError> {
        if self.alias.is_none() {
            return Err(FilterError::InvalidTableName("joins require an aliased base table".to_string()));
        }
        for name in [&join.table, &join.alias, &join.column, &join.base_column] {
            validate_identifier(name)?;
        }
        for (column, output) in &join.select {
            validate_identifier(column)?;
            validate_identifier(output)?;
        }
        self.joins.push(join);
        Ok(self)
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        let order_info = FilterOrder::validate_and_parse(&order_spec)?;
        self.order_data = order_info;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let qualifier = self.alias.as_deref();
        let (where_clause, params) = match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data, qualifier)?,
            None => (String::new(), vec![]),
        };
        let order_clause = FilterOrder::generate(&self.order_data, qualifier)?;

        let query = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM {}", self.build_from_clause()),
            if where_clause.is_empty() { String::new() } else { format!("WHERE {}", where_clause) },
            order_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        let order = FilterOrder::generate(&self.order_data, None)?;
        Ok(SqlResult { query, params, order })
    }

    fn build_select_clause(&self) -> String {
        let mut parts = vec![match self.alias {
            Some(ref alias) => format!("{}.*", quote_identifier(alias)),
            None => "*".to_string(),
        }];
        for join in &self.joins {
            for (column, output) in &join.select {
                parts.push(format!("{} AS {}", qualify(Some(&join.alias), column), quote_identifier(output)));
            }
        }
        parts.join(", ")
    }

    fn build_from_clause(&self) -> String {
        let mut from = quote_identifier(&self.table_name);
        if let Some(ref alias) = self.alias {
            from.push_str(&format!(" AS {}", quote_identifier(alias)));
        }
        for join in &self.joins {
            from.push_str(&format!(
                " LEFT JOIN {} AS {} ON {} = {}",
                quote_identifier(&join.table),
                quote_identifier(&join.alias),
                qualify(Some(&join.alias), &join.column),
                qualify(self.alias.as_deref(), &join.base_column),
            ));
        }
        from
    }

}

/// Identifiers are limited to `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidColumn(format!("Invalid identifier format: {}", name)))
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

pub(crate) fn qualify(qualifier: Option<&str>, column: &str) -> String {
    match qualifier {
        Some(q) => format!("{}.{}", quote_identifier(q), quote_identifier(column)),
        None => quote_identifier(column),
    }
}
