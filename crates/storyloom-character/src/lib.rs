//! Storyloom: Character, Player & Information bounded context.
//!
//! Responsible for the actors of a roleplay: characters with their
//! classified information, and the players that control them.

pub mod application;
pub mod domain;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
