//! Shared types for the leaderboard bot: bus payloads, guild configuration
//! and the platform-neutral message views the renderer produces.

pub mod errors;
pub mod events;
pub mod guild;
pub mod metadata;
pub mod types;

pub use events::*;
pub use guild::*;
pub use types::*;
