//! Reserved envelope metadata keys. Keys are case-sensitive.

/// UUID linking a request envelope to its response envelope.
pub const CORRELATION_ID: &str = "correlation_id";
/// Logical topic, stamped when an envelope is created.
pub const TOPIC: &str = "topic";
/// Tenant (guild) identifier.
pub const GUILD_ID: &str = "guild_id";
pub const CHANNEL_ID: &str = "channel_id";
pub const MESSAGE_ID: &str = "message_id";
/// Free-form origin tag such as `discord_claim`.
pub const SOURCE: &str = "source";
pub const HANDLER_NAME: &str = "handler_name";
pub const DOMAIN: &str = "domain";
pub const RECEIVED_AT: &str = "received_at";

/// Keys copied from an inbound envelope onto every result derived from it.
pub const RETAINED_KEYS: [&str; 3] = [GUILD_ID, CHANNEL_ID, MESSAGE_ID];
