pub mod auth;
pub mod response;

pub use auth::{identity_middleware, Caller};
pub use response::{error_detail_middleware, ApiResponse, ApiResult};
