//! Coordinator gRPC server

use crate::forwarder::AssignmentForwarder;
use crate::service::DispatchService;
use farmdispatch_common::Result;
use farmdispatch_proto::assign_renderer::assignor_server::AssignorServer;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

/// Serves the `Assignor` service on one listening endpoint
pub struct CoordinatorServer<F> {
    service: DispatchService<F>,
}

impl<F: AssignmentForwarder> CoordinatorServer<F> {
    pub fn new(service: DispatchService<F>) -> Self {
        Self { service }
    }

    /// Bind `address` and serve until `shutdown` resolves
    pub async fn serve<S>(self, address: &str, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = address.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_listener<S>(self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            "Coordinator listening at {} with {} render servers",
            listener.local_addr()?,
            self.service.pool().len()
        );

        Server::builder()
            .add_service(AssignorServer::new(self.service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        Ok(())
    }
}
