//! Session-assignment forwarding to a backend's own scheduler endpoint
//!
//! Each forward opens a transient channel, issues exactly one `OpenSession`
//! call under a bounded deadline and drops the channel when it returns.

use crate::pool::ServerRecord;
use farmdispatch_common::error::{DispatchError, Result};
use farmdispatch_common::FarmDispatchConfig;
use farmdispatch_proto::open_session::open_session_client::OpenSessionClient;
use farmdispatch_proto::{ClientRequest, SchedulerRequest};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Endpoint;
use tracing::debug;

/// The part of a client request the backend sees; exclusions stay behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRequest {
    pub version: i32,
    pub res_x: i32,
    pub res_y: i32,
}

impl From<&ClientRequest> for ForwardRequest {
    fn from(req: &ClientRequest) -> Self {
        Self {
            version: req.version,
            res_x: req.res_x,
            res_y: req.res_y,
        }
    }
}

impl From<ForwardRequest> for SchedulerRequest {
    fn from(req: ForwardRequest) -> Self {
        SchedulerRequest {
            version: req.version,
            res_x: req.res_x,
            res_y: req.res_y,
        }
    }
}

/// A backend scheduler's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssignmentDecision {
    pub status: i32,
    pub session_id: i64,
}

/// Relays a session request to the selected backend
#[tonic::async_trait]
pub trait AssignmentForwarder: Send + Sync + 'static {
    /// Forward `request` to `target`'s scheduler endpoint within `deadline`
    async fn forward(
        &self,
        target: &ServerRecord,
        request: ForwardRequest,
        deadline: Duration,
    ) -> Result<AssignmentDecision>;
}

#[tonic::async_trait]
impl<T: AssignmentForwarder> AssignmentForwarder for Arc<T> {
    async fn forward(
        &self,
        target: &ServerRecord,
        request: ForwardRequest,
        deadline: Duration,
    ) -> Result<AssignmentDecision> {
        (**self).forward(target, request, deadline).await
    }
}

/// Forwarder over a fresh plaintext gRPC channel per call
#[derive(Debug, Clone)]
pub struct GrpcForwarder {
    connect_timeout: Duration,
}

impl GrpcForwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(config: &FarmDispatchConfig) -> Result<Self> {
        Ok(Self::new(config.connect_timeout()?))
    }
}

#[tonic::async_trait]
impl AssignmentForwarder for GrpcForwarder {
    async fn forward(
        &self,
        target: &ServerRecord,
        request: ForwardRequest,
        deadline: Duration,
    ) -> Result<AssignmentDecision> {
        let uri = target.scheduler_uri();
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| DispatchError::invalid_endpoint(format!("{}: {}", uri, e)))?
            .connect_timeout(self.connect_timeout.min(deadline))
            .timeout(deadline);

        let call = async {
            let channel = endpoint.connect().await?;
            let mut client = OpenSessionClient::new(channel);

            let mut outbound = tonic::Request::new(SchedulerRequest::from(request));
            outbound.set_timeout(deadline);

            debug!("Forwarding to {}", uri);
            let reply = client.request(outbound).await?.into_inner();
            Ok::<_, DispatchError>(AssignmentDecision {
                status: reply.status,
                session_id: reply.session_id,
            })
        };

        tokio::time::timeout(deadline, call)
            .await
            .map_err(|_| DispatchError::timeout(format!("forward to {} after {:?}", uri, deadline)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Accepts connections and never answers; reports each socket the peer closes
    async fn silent_backend() -> (u16, mpsc::UnboundedReceiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let closed_tx = closed_tx.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
                    let _ = closed_tx.send(());
                });
            }
        });

        (port, closed_rx)
    }

    #[test]
    fn test_forward_request_drops_exclusions() {
        let client = ClientRequest {
            version: 3,
            res_x: 1920,
            res_y: 1080,
            ex_servers: vec!["h1:9001".to_string()],
        };

        let forwarded = SchedulerRequest::from(ForwardRequest::from(&client));
        assert_eq!(forwarded.version, 3);
        assert_eq!(forwarded.res_x, 1920);
        assert_eq!(forwarded.res_y, 1080);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        // Reserve a port, then free it so nothing is listening there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = ServerRecord::new("127.0.0.1", "9001", port.to_string());
        let forwarder = GrpcForwarder::new(Duration::from_millis(200));
        let request = ForwardRequest {
            version: 1,
            res_x: 640,
            res_y: 480,
        };

        let result = forwarder
            .forward(&target, request, Duration::from_millis(500))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_silent_backend_hits_deadline() {
        let (port, mut closed) = silent_backend().await;
        let target = ServerRecord::new("127.0.0.1", "9001", port.to_string());
        let forwarder = GrpcForwarder::new(Duration::from_millis(200));
        let request = ForwardRequest {
            version: 1,
            res_x: 640,
            res_y: 480,
        };

        let started = std::time::Instant::now();
        let result = forwarder
            .forward(&target, request, Duration::from_millis(300))
            .await;
        let elapsed = started.elapsed();

        assert!(result.is_err());
        assert!(elapsed >= Duration::from_millis(250), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);

        // The transient channel is gone once forward returns
        let closed = tokio::time::timeout(Duration::from_secs(2), closed.recv()).await;
        assert_eq!(closed.unwrap(), Some(()));
    }

    #[tokio::test]
    async fn test_invalid_host_is_an_error() {
        let target = ServerRecord::new("bad host", "9001", "7001");
        let forwarder = GrpcForwarder::new(Duration::from_millis(200));
        let request = ForwardRequest {
            version: 1,
            res_x: 640,
            res_y: 480,
        };

        let err = forwarder
            .forward(&target, request, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidEndpoint(_)));
    }
}
