//! Shared domain abstractions.
//!
//! Every bounded context builds on the identifiers and ports defined here.
//! Nothing in this crate touches a database or the network.

pub mod aggregate;
pub mod clock;
pub mod color;
pub mod command;
pub mod error;
pub mod event;
pub mod identity;
pub mod ids;
