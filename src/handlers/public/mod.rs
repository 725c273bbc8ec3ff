// handlers/public/mod.rs - Public handlers (no identity required)
//
// Service descriptor, health probe and the CI type catalog.
pub mod ci_types;
pub mod service;

pub use ci_types::list as ci_types_list;
pub use service::{health, root};
