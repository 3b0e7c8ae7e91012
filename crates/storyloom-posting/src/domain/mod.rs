//! Domain layer for the Posting Pipeline & Undo context.

pub mod attempt;
pub mod chunking;
pub mod messaging;
pub mod outcome;
pub mod post;
pub mod repository;
