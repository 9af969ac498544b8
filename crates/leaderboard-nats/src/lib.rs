//! Event bus plumbing for the leaderboard bot: NATS JetStream transport,
//! envelopes, topic names and an in-memory bus for tests.

pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod jetstream;
pub mod memory;
pub mod nats;
pub mod retry;
pub mod topics;
pub mod trace;

pub use bus::{Acker, BusHealth, Delivery, DeliveryStream, EventBus};
pub use config::NatsConfig;
pub use envelope::{Envelope, Metadata};
pub use error::{BusError, EnvelopeError};
pub use jetstream::JetStreamBus;
pub use memory::{AckEvent, InMemoryBus};
pub use nats::connect;
pub use retry::RetryPolicy;
