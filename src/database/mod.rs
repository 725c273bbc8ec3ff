pub mod executor;
pub mod manager;
pub mod models;
pub mod statement;

pub use executor::{PgExecutor, QueryExecutor, QueryOutcome, Row};
pub use manager::{DatabaseError, DatabaseManager};
pub use statement::{InsertBuilder, Statement, UpdateBuilder};
