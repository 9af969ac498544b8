//! Event payloads carried on the bus, one struct per topic.
//!
//! Field names are snake_case. Unknown fields are ignored on decode, missing
//! required fields fail.

pub mod history;
pub mod leaderboard;
pub mod replies;
pub mod season;
pub mod tags;

pub use history::*;
pub use leaderboard::*;
pub use replies::*;
pub use season::*;
pub use tags::*;

/// Serde adapter for raw bytes carried as standard base64 strings.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
