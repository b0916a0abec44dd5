//! Transport-layer contracts consumed by the recovery core.
//!
//! Wire framing, heartbeat, and protocol negotiation are out of scope; they
//! live behind these traits. The recovery core only needs to (re)open
//! transports, open channels on them, replay declarations, and observe the
//! event stream.
//!
//! ## Contents
//! - [`Endpoint`], [`EndpointResolver`], [`StaticResolver`],
//!   [`TransportFactory`] endpoint selection and connection construction
//! - [`Transport`], [`TransportEvent`], [`ShutdownEvent`],
//!   [`ShutdownInitiator`] the connection contract and its event stream
//! - [`TransportChannel`], [`ConsumerDelegate`], [`Delivery`] the channel
//!   contract and the consumer delivery seam

mod channel;
mod connection;
mod endpoint;

pub use channel::{ConsumerDelegate, Delivery, TransportChannel};
pub use connection::{ShutdownEvent, ShutdownInitiator, Transport, TransportEvent};
pub use endpoint::{Endpoint, EndpointResolver, StaticResolver, TransportFactory};
