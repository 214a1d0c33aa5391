//! FarmDispatch Worker
//!
//! The scheduling endpoint each render server exposes. The coordinator
//! forwards a session request here once it has picked this server.

pub mod grpc;
pub mod session;

pub use grpc::{OpenSessionService, WorkerServer};
pub use session::{Session, SessionId, SessionTable};
