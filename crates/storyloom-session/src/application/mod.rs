//! Application layer for the Session context.

pub mod command_handlers;
pub mod notifier;
pub mod query_handlers;
pub mod registry;
