//! Route modules organized by bounded context.

pub mod channels;
pub mod characters;
pub mod events;
pub mod health;
pub mod players;
pub mod posting;
pub mod sessions;
