use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub client_ip: IpAddr,
    pub domain: String,
    pub query_type: String,
    pub action: QueryLogAction,
    /// Blocked with an NXDOMAIN answer rather than a sinkhole address.
    pub nxdomain: bool,
    pub upstream: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QueryLogAction {
    Blocked,
    Forwarded,
    Failed,
}

pub trait QueryLogSink: Send + Sync {
    fn log(&self, entry: &QueryLogEntry);
}
