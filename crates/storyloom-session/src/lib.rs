//! Storyloom: Session & Turn Order bounded context.
//!
//! Owns the roleplay session aggregate: its characters, the act/chapter/round
//! progression, and the turn-order engine that decides who may post next.

pub mod application;
pub mod domain;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
