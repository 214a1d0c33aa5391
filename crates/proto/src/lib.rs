//! FarmDispatch Protocol Buffers
//!
//! Generated gRPC types for both hops of a dispatch: the client-facing
//! `Assignor` service and the per-backend `OpenSession` service.

/// Client → coordinator
pub mod assign_renderer {
    tonic::include_proto!("assign_renderer");
}

/// Coordinator → render server scheduler endpoint
pub mod open_session {
    tonic::include_proto!("open_session");
}

pub use assign_renderer::{ClientRequest, ServerInfo};
pub use open_session::{SchedulerRequest, SchedulerResponse};
