// handlers/elevated/mod.rs - Elevated handlers (admin required)
pub mod impersonate;

pub use impersonate::get as impersonate_get;
