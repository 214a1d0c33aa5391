//! FarmDispatch Coordinator
//!
//! Stateless front end that picks a render server from a static pool and
//! opens a session on it through the server's own scheduling endpoint.

pub mod forwarder;
pub mod pool;
pub mod selector;
pub mod server;
pub mod service;

pub use forwarder::{AssignmentDecision, AssignmentForwarder, ForwardRequest, GrpcForwarder};
pub use pool::{ServerPool, ServerRecord};
pub use selector::{select, ExclusionSet};
pub use server::CoordinatorServer;
pub use service::{DispatchOutcome, DispatchService};
