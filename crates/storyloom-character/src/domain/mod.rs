//! Domain layer for the Character context.

pub mod aggregates;
pub mod commands;
pub mod information;
pub mod repository;
