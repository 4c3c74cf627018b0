use anyhow::Result;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{Record, RecordType};
use hickory_resolver::TokioResolver;

/// What the next stage answered for an allowed query.
#[derive(Debug, Clone)]
pub struct UpstreamAnswer {
    pub response_code: ResponseCode,
    pub answers: Vec<Record>,
    /// Authority records, the SOA of a negative answer.
    pub authority: Vec<Record>,
    /// Label of the upstream that produced the answer.
    pub upstream: String,
}

/// Next stage of the pipeline for queries the filter lets through.
///
/// NXDOMAIN and NODATA are answers, not errors. `Err` means the upstream
/// could not be reached or returned garbage.
#[async_trait::async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, name: &str, query_type: RecordType) -> Result<UpstreamAnswer>;
}

pub struct Upstream {
    pub url: String,
    pub resolver: TokioResolver,
}
