//! Common error types for FarmDispatch
//!
//! This module defines all error types used across the FarmDispatch system.
//! All errors are convertible to gRPC status codes; the dispatch path itself
//! absorbs per-request failures into the response instead of returning them.

use std::net::AddrParseError;
use thiserror::Error;

/// Main error type for FarmDispatch
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server pool could not be loaded
    #[error("Server pool load error: {0}")]
    PoolLoad(String),

    /// Exclusion entry that is not a `host:port` pair
    #[error("Malformed exclusion entry: {0}")]
    MalformedExclusion(String),

    /// gRPC communication errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    /// gRPC transport errors
    #[error("gRPC transport error: {0}")]
    GrpcTransport(#[from] tonic::transport::Error),

    /// Backend address cannot be turned into an endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AddrParseError> for DispatchError {
    fn from(err: AddrParseError) -> Self {
        DispatchError::Parse(err.to_string())
    }
}

impl DispatchError {
    /// Convert error to gRPC status code
    pub fn to_status(&self) -> tonic::Status {
        match self {
            DispatchError::Grpc(status) => status.clone(),
            DispatchError::GrpcTransport(_) => {
                tonic::Status::unavailable("Transport error")
            }
            DispatchError::Config(msg) => {
                tonic::Status::internal(format!("Configuration error: {}", msg))
            }
            DispatchError::PoolLoad(msg) => {
                tonic::Status::failed_precondition(format!("Server pool error: {}", msg))
            }
            DispatchError::MalformedExclusion(msg) => {
                tonic::Status::invalid_argument(format!("Malformed exclusion: {}", msg))
            }
            DispatchError::InvalidEndpoint(msg) => {
                tonic::Status::invalid_argument(format!("Invalid endpoint: {}", msg))
            }
            DispatchError::Timeout(msg) => {
                tonic::Status::deadline_exceeded(format!("Timeout: {}", msg))
            }
            DispatchError::Io(err) => {
                tonic::Status::internal(format!("I/O error: {}", err))
            }
            DispatchError::Parse(msg) => {
                tonic::Status::invalid_argument(format!("Parse error: {}", msg))
            }
            DispatchError::Internal(msg) => {
                tonic::Status::internal(format!("Internal error: {}", msg))
            }
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        DispatchError::Config(msg.into())
    }

    /// Create a pool load error
    pub fn pool_load(msg: impl Into<String>) -> Self {
        DispatchError::PoolLoad(msg.into())
    }

    /// Create a malformed exclusion error
    pub fn malformed_exclusion(msg: impl Into<String>) -> Self {
        DispatchError::MalformedExclusion(msg.into())
    }

    /// Create an invalid endpoint error
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        DispatchError::InvalidEndpoint(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        DispatchError::Timeout(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        DispatchError::Internal(msg.into())
    }
}

/// Result type alias for FarmDispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
