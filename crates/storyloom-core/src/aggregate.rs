//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// An aggregate held in memory, saved whole after each mutation.
///
/// Mutating methods bump the version and queue an event. The caller saves the
/// aggregate, then drains the queue and hands the events to subscribers.
pub trait AggregateRoot: Send + Sync {
    type Event: DomainEvent;

    fn aggregate_id(&self) -> Uuid;

    /// Count of mutations applied since creation.
    fn version(&self) -> i64;

    /// Events recorded since the last drain.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains the queued events.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
