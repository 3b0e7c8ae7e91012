//! Application layer for the Posting Pipeline & Undo context.

pub mod pipeline;
pub mod publishing;
pub mod undo;
