// handlers/protected/mod.rs - Protected handlers (caller identity required)
//
// Reads need an authenticated caller; writes need the agent level, and a few
// user-role operations escalate to admin inside the handler.
pub mod configuration_items;
pub mod user_roles;
