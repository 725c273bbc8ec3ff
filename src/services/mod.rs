pub mod ci_types;
pub mod configuration_items;
pub mod error;
pub mod users;

pub use ci_types::CiTypeService;
pub use configuration_items::ConfigurationItemService;
pub use error::ServiceError;
pub use users::UserService;
