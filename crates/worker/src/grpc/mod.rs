//! gRPC surface of the worker

pub mod server;

pub use server::{OpenSessionService, WorkerServer};
