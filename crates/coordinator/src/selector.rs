//! First-fit server selection with client-supplied exclusions

use crate::pool::{ServerPool, ServerRecord};
use farmdispatch_common::error::{DispatchError, Result};
use farmdispatch_common::METRICS;
use tracing::{debug, warn};

/// Split `host:port`, accepting a bracketed IPv6 host (`[::1]:9001`)
pub fn split_host_port(entry: &str) -> Result<(&str, &str)> {
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| DispatchError::malformed_exclusion(format!("{}: missing ']'", entry)))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| DispatchError::malformed_exclusion(format!("{}: missing port", entry)))?;
        if port.contains(':') {
            return Err(DispatchError::malformed_exclusion(format!("{}: too many colons", entry)));
        }
        if has_bracket(host) || has_bracket(port) {
            return Err(DispatchError::malformed_exclusion(format!("{}: unexpected bracket", entry)));
        }
        return Ok((host, port));
    }

    let (host, port) = entry
        .rsplit_once(':')
        .ok_or_else(|| DispatchError::malformed_exclusion(format!("{}: missing port", entry)))?;
    if host.contains(':') {
        return Err(DispatchError::malformed_exclusion(format!("{}: too many colons", entry)));
    }
    if has_bracket(host) || has_bracket(port) {
        return Err(DispatchError::malformed_exclusion(format!("{}: unexpected bracket", entry)));
    }
    Ok((host, port))
}

fn has_bracket(part: &str) -> bool {
    part.contains('[') || part.contains(']')
}

/// Parsed exclusion list; malformed entries are dropped at parse time
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: Vec<(String, String)>,
}

impl ExclusionSet {
    /// Parse `host:port` entries, logging and skipping any that do not split
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = ExclusionSet::default();
        for entry in entries {
            match split_host_port(entry.as_ref()) {
                Ok((host, port)) => set.entries.push((host.to_string(), port.to_string())),
                Err(e) => {
                    warn!("Skipping exclusion: {}", e);
                    METRICS.dispatch.malformed_exclusions_total.inc();
                }
            }
        }
        set
    }

    /// Whether `record` is excluded by its client-visible `(host, render_port)`
    pub fn excludes(&self, record: &ServerRecord) -> bool {
        self.entries
            .iter()
            .any(|(host, port)| *host == record.host && *port == record.render_port)
    }

    /// Number of usable entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Return the first record in pool order that is not excluded
///
/// `None` is the ordinary "no capacity" outcome, not an error.
pub fn select<'a>(pool: &'a ServerPool, exclusions: &ExclusionSet) -> Option<&'a ServerRecord> {
    for record in pool.iter() {
        if exclusions.excludes(record) {
            debug!("Excluded: {}", record.render_endpoint());
            continue;
        }
        return Some(record);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ServerPool {
        ServerPool::new(vec![
            ServerRecord::new("h1", "9001", "7001"),
            ServerRecord::new("h2", "9002", "7002"),
        ])
    }

    #[test]
    fn test_empty_exclusions_pick_first() {
        let pool = pool();
        let selected = select(&pool, &ExclusionSet::default()).unwrap();
        assert_eq!(selected.host, "h1");
    }

    #[test]
    fn test_excluded_first_falls_through() {
        let pool = pool();
        let selected = select(&pool, &ExclusionSet::parse(["h1:9001"])).unwrap();

        assert_eq!(selected.host, "h2");
        assert_eq!(selected.scheduler_endpoint(), "h2:7002");
    }

    #[test]
    fn test_all_excluded_returns_none() {
        let pool = pool();
        assert!(select(&pool, &ExclusionSet::parse(["h2:9002", "h1:9001"])).is_none());

        let single = ServerPool::new(vec![ServerRecord::new("h1", "9001", "7001")]);
        assert!(select(&single, &ExclusionSet::parse(["h1:9001"])).is_none());
    }

    #[test]
    fn test_exclusion_matches_render_port_not_scheduler_port() {
        let pool = pool();
        let selected = select(&pool, &ExclusionSet::parse(["h1:7001"])).unwrap();
        assert_eq!(selected.host, "h1");
    }

    #[test]
    fn test_malformed_entries_never_exclude() {
        let pool = pool();
        let exclusions = ExclusionSet::parse(["not-a-host-port", "a:b:c", "[::1", "h[1:9001"]);

        assert!(exclusions.is_empty());
        assert_eq!(select(&pool, &exclusions).unwrap().host, "h1");
    }

    #[test]
    fn test_malformed_entry_does_not_affect_others() {
        let pool = pool();
        let exclusions = ExclusionSet::parse(["garbage", "h1:9001"]);

        assert_eq!(exclusions.len(), 1);
        assert_eq!(select(&pool, &exclusions).unwrap().host, "h2");
    }

    #[test]
    fn test_empty_pool() {
        assert!(select(&ServerPool::default(), &ExclusionSet::default()).is_none());
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("h1:9001").unwrap(), ("h1", "9001"));
        assert_eq!(split_host_port("[::1]:9001").unwrap(), ("::1", "9001"));
        assert_eq!(split_host_port(":9001").unwrap(), ("", "9001"));
        assert!(split_host_port("h1").is_err());
        assert!(split_host_port("::1:9001").is_err());
        assert!(split_host_port("[::1]9001").is_err());
        assert!(split_host_port("h[1:9001").is_err());
        assert!(split_host_port("h]1:9001").is_err());
        assert!(split_host_port("h1:90]01").is_err());
        assert!(split_host_port("[[::1]:9001").is_err());
    }
}
