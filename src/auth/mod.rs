pub mod identity;
pub mod policy;

pub use identity::{Identity, IdentityError};
pub use policy::{authorize, AccessLevel, Authorized};
