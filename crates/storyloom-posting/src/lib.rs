//! Storyloom: Posting Pipeline & Undo bounded context.
//!
//! Drives one posting attempt from character selection to published
//! messages, records the post, and reverses the most recent post on request.

pub mod application;
pub mod domain;

#[cfg(test)]
mod fixtures;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
