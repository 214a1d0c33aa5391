//! Static pool of render servers
//!
//! The pool is read once at startup from a headerless CSV resource with one
//! `host,render_port,scheduler_port` row per backend. Row order is the
//! selection order.

use csv::{ReaderBuilder, Trim};
use farmdispatch_common::error::{DispatchError, Result};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One backend render server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    /// Host clients and the coordinator use to reach the server
    pub host: String,

    /// Port clients stream frames from
    pub render_port: String,

    /// Port of the server's own `OpenSession` endpoint
    pub scheduler_port: String,
}

impl ServerRecord {
    pub fn new(
        host: impl Into<String>,
        render_port: impl Into<String>,
        scheduler_port: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            render_port: render_port.into(),
            scheduler_port: scheduler_port.into(),
        }
    }

    /// Client-visible `host:render_port`
    pub fn render_endpoint(&self) -> String {
        join_host_port(&self.host, &self.render_port)
    }

    /// `host:scheduler_port` the coordinator forwards to
    pub fn scheduler_endpoint(&self) -> String {
        join_host_port(&self.host, &self.scheduler_port)
    }

    /// URI for a plaintext gRPC channel to the scheduler endpoint
    pub fn scheduler_uri(&self) -> String {
        format!("http://{}", self.scheduler_endpoint())
    }

    /// Render port as the integer carried in `ServerInfo.port`
    pub fn render_port_number(&self) -> Result<i32> {
        self.render_port
            .parse::<i32>()
            .map_err(|e| DispatchError::Parse(format!("render port {:?}: {}", self.render_port, e)))
    }
}

/// Bracket IPv6 literals so the port separator stays unambiguous
fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Ordered, immutable list of backends
#[derive(Debug, Clone, Default)]
pub struct ServerPool {
    records: Vec<ServerRecord>,
}

impl ServerPool {
    /// Create a pool from records in selection order
    pub fn new(records: Vec<ServerRecord>) -> Self {
        Self { records }
    }

    /// Load the pool from a CSV file; any unreadable or short row is fatal
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            DispatchError::pool_load(format!("cannot open {}: {}", path.display(), e))
        })?;

        let pool = Self::from_reader(file).map_err(|e| match e {
            DispatchError::PoolLoad(msg) => {
                DispatchError::pool_load(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        info!("Loaded {} render servers from {}", pool.len(), path.display());
        Ok(pool)
    }

    /// Parse pool rows from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (index, row) in csv_reader.records().enumerate() {
            let row = row.map_err(|e| {
                DispatchError::pool_load(format!("row {} is not valid CSV: {}", index + 1, e))
            })?;

            if row.len() < 3 {
                return Err(DispatchError::pool_load(format!(
                    "row {} has {} fields, expected host,render_port,scheduler_port",
                    index + 1,
                    row.len()
                )));
            }

            records.push(ServerRecord::new(&row[0], &row[1], &row[2]));
        }

        if records.is_empty() {
            warn!("Server pool is empty; every request will report no capacity");
        }

        Ok(Self::new(records))
    }

    /// Records in selection order
    pub fn iter(&self) -> impl Iterator<Item = &ServerRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_preserves_order() {
        let pool = ServerPool::from_reader("h1,9001,7001\nh2,9002,7002\n".as_bytes()).unwrap();

        assert_eq!(pool.len(), 2);
        let records: Vec<_> = pool.iter().cloned().collect();
        assert_eq!(
            records,
            vec![
                ServerRecord::new("h1", "9001", "7001"),
                ServerRecord::new("h2", "9002", "7002"),
            ]
        );
    }

    #[test]
    fn test_short_row_is_fatal() {
        let err = ServerPool::from_reader("h1,9001,7001\nh2,9002\n".as_bytes()).unwrap_err();

        assert!(matches!(err, DispatchError::PoolLoad(_)));
        assert!(err.to_string().contains("row 2 has 2 fields"));
    }

    #[test]
    fn test_extra_fields_and_whitespace() {
        let pool = ServerPool::from_reader(" h1 , 9001 , 7001 , gpu\n".as_bytes()).unwrap();
        assert_eq!(pool.iter().next(), Some(&ServerRecord::new("h1", "9001", "7001")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.5,9001,7001").unwrap();

        let pool = ServerPool::load(file.path()).unwrap();
        assert_eq!(pool.iter().next().unwrap().scheduler_endpoint(), "10.0.0.5:7001");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = ServerPool::load("/nonexistent/servers.csv").unwrap_err();
        assert!(matches!(err, DispatchError::PoolLoad(_)));
    }

    #[test]
    fn test_endpoints() {
        let record = ServerRecord::new("::1", "9001", "7001");
        assert_eq!(record.render_endpoint(), "[::1]:9001");
        assert_eq!(record.scheduler_uri(), "http://[::1]:7001");

        let record = ServerRecord::new("h1", "9001", "7001");
        assert_eq!(record.render_port_number().unwrap(), 9001);
        assert!(ServerRecord::new("h1", "render", "7001").render_port_number().is_err());
    }
}
