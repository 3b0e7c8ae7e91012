//! Shared test doubles for the Storyloom turn engine.

mod clock;
mod identity;

pub use clock::{FixedClock, SteppingClock};
pub use identity::StaticIdentityResolver;
