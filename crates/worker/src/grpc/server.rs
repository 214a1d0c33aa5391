//! Worker gRPC server implementation

use crate::session::SessionTable;
use farmdispatch_common::status::{STATUS_NO_CAPACITY, STATUS_OK};
use farmdispatch_common::Result;
use farmdispatch_proto::open_session::open_session_server::{OpenSession, OpenSessionServer};
use farmdispatch_proto::{SchedulerRequest, SchedulerResponse};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

/// `OpenSession` endpoint backed by a [`SessionTable`]
#[derive(Clone)]
pub struct OpenSessionService {
    sessions: Arc<SessionTable>,
}

impl OpenSessionService {
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self { sessions }
    }
}

#[tonic::async_trait]
impl OpenSession for OpenSessionService {
    async fn request(
        &self,
        request: Request<SchedulerRequest>,
    ) -> std::result::Result<Response<SchedulerResponse>, Status> {
        let req = request.into_inner();
        info!(
            "Received session request: version={}, res_x={}, res_y={}",
            req.version, req.res_x, req.res_y
        );

        let reply = match self.sessions.open(req.version, req.res_x, req.res_y) {
            Some(session_id) => {
                info!("Opened session {}", session_id);
                SchedulerResponse {
                    status: STATUS_OK,
                    session_id,
                }
            }
            None => {
                warn!("Refusing session: table full");
                SchedulerResponse {
                    status: STATUS_NO_CAPACITY,
                    session_id: 0,
                }
            }
        };

        Ok(Response::new(reply))
    }
}

/// Worker gRPC server
pub struct WorkerServer {
    service: OpenSessionService,
}

impl WorkerServer {
    /// Create a new worker server
    pub fn new(sessions: Arc<SessionTable>) -> Self {
        Self {
            service: OpenSessionService::new(sessions),
        }
    }

    /// Bind `address` and serve until `shutdown` resolves
    pub async fn serve<F>(self, address: &str, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr: SocketAddr = address.parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!("Worker gRPC server listening on {}", listener.local_addr()?);

        Server::builder()
            .add_service(OpenSessionServer::new(self.service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        Ok(())
    }
}
