//! # Endpoints, the resolver contract, and the transport factory.
//!
//! Endpoint selection policy is a collaborator: the recovery core asks the
//! resolver for the next candidate before every connect, initial or
//! recovering. Resolvers may rotate, back off, or fail; a resolver failure is
//! treated as one more retryable recovery failure.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::Transport;

/// A host/port pair the transport can dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Picks the endpoint for the next connection attempt.
#[async_trait]
pub trait EndpointResolver: Send + Sync + 'static {
    /// Returns the next candidate endpoint.
    ///
    /// Failures propagate to the supervisor as a retryable recovery failure.
    async fn resolve(&self) -> Result<Endpoint, TransportError>;
}

/// Round-robin resolver over a fixed endpoint list.
pub struct StaticResolver {
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
}

impl StaticResolver {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EndpointResolver for StaticResolver {
    async fn resolve(&self) -> Result<Endpoint, TransportError> {
        if self.endpoints.is_empty() {
            return Err(TransportError::NoEndpoint);
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Ok(self.endpoints[i].clone())
    }
}

/// Builds a fresh transport connection for an endpoint.
///
/// Implementations construct the frame handler and a transport connection in
/// **non-automatic** mode: the inner connection must never attempt recovery
/// itself, that is the supervisor's job.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_rotates() {
        let resolver = StaticResolver::new(vec![
            Endpoint::new("a", 5672),
            Endpoint::new("b", 5672),
        ]);
        assert_eq!(resolver.resolve().await.unwrap().host, "a");
        assert_eq!(resolver.resolve().await.unwrap().host, "b");
        assert_eq!(resolver.resolve().await.unwrap().host, "a");
    }

    #[tokio::test]
    async fn empty_resolver_fails() {
        let resolver = StaticResolver::new(Vec::new());
        assert!(matches!(
            resolver.resolve().await,
            Err(TransportError::NoEndpoint)
        ));
    }
}
