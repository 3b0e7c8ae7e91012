//! Change notices emitted by aggregates.
//!
//! Aggregates in this workspace persist as snapshot rows. Events are not a
//! storage format here: they describe what a committed mutation changed so
//! that subscribers (live panels, logs) can react to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookkeeping stamped on every event when its aggregate records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    /// Aggregate the mutation was applied to.
    pub aggregate_id: Uuid,
    /// Aggregate version once this mutation is applied. Starts at 1.
    pub version: i64,
    /// Correlation ID of the command that caused the mutation.
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// An event recorded by an aggregate.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Dotted name such as `session.turn_order_set`.
    fn event_type(&self) -> &'static str;

    fn metadata(&self) -> &EventMetadata;
}
