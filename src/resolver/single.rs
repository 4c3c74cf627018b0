use super::types::{DnsResolver, Upstream, UpstreamAnswer};
use anyhow::Result;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{Record, RecordType};
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveError, ResolveErrorKind};
use tracing::{debug, error};

/// Forwards every allowed query to one upstream server.
pub struct SingleResolver {
    pub(crate) upstream: Upstream,
}

#[async_trait::async_trait]
impl DnsResolver for SingleResolver {
    async fn resolve(&self, name: &str, query_type: RecordType) -> Result<UpstreamAnswer> {
        match self.upstream.resolver.lookup(name, query_type).await {
            Ok(lookup) => Ok(UpstreamAnswer {
                response_code: ResponseCode::NoError,
                answers: lookup.records().to_vec(),
                authority: Vec::new(),
                upstream: self.upstream.url.clone(),
            }),
            Err(e) => match negative_answer(&e) {
                Some((response_code, authority)) => {
                    debug!(
                        "Upstream {} answered {} for {}",
                        self.upstream.url, response_code, name
                    );
                    Ok(UpstreamAnswer {
                        response_code,
                        answers: Vec::new(),
                        authority,
                        upstream: self.upstream.url.clone(),
                    })
                }
                None => {
                    error!("Upstream {} failed for {}: {}", self.upstream.url, name, e);
                    Err(anyhow::anyhow!("Upstream failed for {}", name))
                }
            },
        }
    }
}

/// Response code and SOA of an NXDOMAIN or NODATA answer. `None` for
/// transport and protocol failures.
fn negative_answer(err: &ResolveError) -> Option<(ResponseCode, Vec<Record>)> {
    let ResolveErrorKind::Proto(proto) = err.kind() else {
        return None;
    };
    match proto.kind() {
        ProtoErrorKind::NoRecordsFound {
            soa, response_code, ..
        } => {
            let authority = soa
                .iter()
                .map(|soa| (**soa).clone().into_record_of_rdata())
                .collect();
            Some((*response_code, authority))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_is_not_a_negative_answer() {
        let err = ResolveError::from("request timed out");
        assert!(negative_answer(&err).is_none());
    }
}
