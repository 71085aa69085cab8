//! Durable WebSocket channel to the signaling relay.
//!
//! One connection per local identity. Every successful (re)open asserts
//! room membership with `join_room`; sends while the channel is not open
//! are dropped, never queued; abnormal closes are retried with exponential
//! backoff up to a ceiling, a deliberate close never is.

mod client;
mod connection;
mod types;


pub use client::{Outbox, SignalingTransport};
pub use types::{ConnectionState, TransportConfig, TransportEvent};
