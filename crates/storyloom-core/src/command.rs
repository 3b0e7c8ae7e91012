//! Command abstractions.

use uuid::Uuid;

/// A request to change state, handled by one command handler.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted `context.action` name, used in logs.
    fn command_type(&self) -> &'static str;

    /// Correlation ID carried into every event the command produces.
    fn correlation_id(&self) -> Uuid;
}
