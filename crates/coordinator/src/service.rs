//! Dispatch handler for the client-facing `Assignor` service
//!
//! A request runs once through select, forward and respond. Per-request
//! failures never surface as gRPC errors; they are encoded in
//! `ServerInfo.status` instead.

use crate::forwarder::{AssignmentDecision, AssignmentForwarder, ForwardRequest};
use crate::pool::{ServerPool, ServerRecord};
use crate::selector::{select, ExclusionSet};
use farmdispatch_common::error::DispatchError;
use farmdispatch_common::status::{STATUS_DOWNSTREAM_FAILED, STATUS_NO_CAPACITY};
use farmdispatch_common::METRICS;
use farmdispatch_proto::assign_renderer::assignor_server::Assignor;
use farmdispatch_proto::{ClientRequest, ServerInfo};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a single dispatch ended
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The selected backend answered; its status may still be a refusal
    Assigned {
        record: ServerRecord,
        decision: AssignmentDecision,
    },

    /// Every pool entry was excluded
    NoCapacity,

    /// The forwarding call failed or ran out of time
    DownstreamFailed {
        record: ServerRecord,
        error: DispatchError,
    },
}

impl DispatchOutcome {
    /// Outward response; host and port always come from the selected record
    pub fn into_server_info(self) -> ServerInfo {
        match self {
            DispatchOutcome::NoCapacity => ServerInfo {
                status: STATUS_NO_CAPACITY,
                host: String::new(),
                port: 0,
                session_id: 0,
            },
            DispatchOutcome::Assigned { record, decision } => ServerInfo {
                status: decision.status,
                port: response_port(&record),
                host: record.host,
                session_id: decision.session_id,
            },
            DispatchOutcome::DownstreamFailed { record, .. } => ServerInfo {
                status: STATUS_DOWNSTREAM_FAILED,
                port: response_port(&record),
                host: record.host,
                session_id: 0,
            },
        }
    }
}

fn response_port(record: &ServerRecord) -> i32 {
    match record.render_port_number() {
        Ok(port) => port,
        Err(e) => {
            warn!("Could not convert port for {}: {}", record.host, e);
            0
        }
    }
}

/// Parse a `grpc-timeout` header value such as `250m` or `5S`
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    // At most 8 digits on the wire
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Deadline the inbound caller attached, if any
pub fn inbound_deadline(metadata: &MetadataMap) -> Option<Duration> {
    metadata
        .get("grpc-timeout")
        .and_then(|value| value.to_str().ok())
        .and_then(parse_grpc_timeout)
}

/// Wires the selector and forwarder together over a shared read-only pool
pub struct DispatchService<F> {
    pool: Arc<ServerPool>,
    forwarder: F,
    forward_timeout: Duration,
}

impl<F: AssignmentForwarder> DispatchService<F> {
    pub fn new(pool: Arc<ServerPool>, forwarder: F, forward_timeout: Duration) -> Self {
        Self {
            pool,
            forwarder,
            forward_timeout,
        }
    }

    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }

    /// Run one request through selection and forwarding
    pub async fn dispatch(
        &self,
        request: &ClientRequest,
        caller_deadline: Option<Duration>,
    ) -> DispatchOutcome {
        METRICS.dispatch.requests_total.inc();
        info!(
            "Received: ver={}, res_x={}, res_y={}",
            request.version, request.res_x, request.res_y
        );

        let exclusions = ExclusionSet::parse(&request.ex_servers);
        let record = match select(&self.pool, &exclusions) {
            Some(record) => record.clone(),
            None => {
                info!("No render server available ({} excluded)", exclusions.len());
                METRICS.dispatch.no_capacity_total.inc();
                return DispatchOutcome::NoCapacity;
            }
        };
        info!("Selected: {}", record.render_endpoint());

        let deadline = match caller_deadline {
            Some(caller) => caller.min(self.forward_timeout),
            None => self.forward_timeout,
        };

        let started = Instant::now();
        let result = self
            .forwarder
            .forward(&record, ForwardRequest::from(request), deadline)
            .await;
        METRICS
            .dispatch
            .forward_duration
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(decision) => {
                info!(
                    "Assigning to server {}: status={} id={}",
                    record.host, decision.status, decision.session_id
                );
                METRICS.dispatch.assigned_total.inc();
                DispatchOutcome::Assigned { record, decision }
            }
            Err(error) => {
                warn!("Could not assign via {}: {}", record.scheduler_endpoint(), error);
                METRICS.dispatch.downstream_failures_total.inc();
                DispatchOutcome::DownstreamFailed { record, error }
            }
        }
    }
}

#[tonic::async_trait]
impl<F: AssignmentForwarder> Assignor for DispatchService<F> {
    async fn request(
        &self,
        request: Request<ClientRequest>,
    ) -> std::result::Result<Response<ServerInfo>, Status> {
        let caller_deadline = inbound_deadline(request.metadata());
        let span = info_span!("dispatch", request_id = %Uuid::new_v4());

        let outcome = self
            .dispatch(request.get_ref(), caller_deadline)
            .instrument(span)
            .await;

        Ok(Response::new(outcome.into_server_info()))
    }
}
