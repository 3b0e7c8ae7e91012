//! `PostgreSQL` persistence for Storyloom.
//!
//! Implements every repository port of the turn engine on top of `sqlx`,
//! plus the outbox that backs the relay messaging surface.

pub mod error;
pub mod pg_character_repository;
pub mod pg_information_repository;
pub mod pg_player_repository;
pub mod pg_post_repository;
pub mod pg_session_repository;
pub mod relay_outbox;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
