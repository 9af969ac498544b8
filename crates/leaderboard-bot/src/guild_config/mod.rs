//! Guild configuration: a read-mostly cache plus a resolver that fetches
//! misses from the backend over the bus.

mod cache;
mod resolver;

pub use cache::{CachedGuildConfig, GuildConfigCache};
pub use resolver::GuildConfigResolver;
