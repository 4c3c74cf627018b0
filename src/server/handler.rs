//! DNS request handler.
//!
//! Glues the decision engine to hickory's server: blocked queries get the
//! synthesized answer, everything else is forwarded to the next stage.

use crate::engine::{normalize_domain, BlockedResponse, DecisionEngine, Verdict};
use crate::logger::{QueryLogAction, QueryLogEntry, QueryLogger};
use crate::resolver::DnsResolver;
use crate::stats::StatsCollector;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::proto::op::{Header, ResponseCode};
use hickory_server::proto::rr::{Name, Record};
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use super::types::QueryContext;

#[derive(Clone)]
pub struct DnsHandler {
    engine: Arc<DecisionEngine>,
    next: Arc<dyn DnsResolver>,
    stats: Arc<StatsCollector>,
    logger: Arc<QueryLogger>,
}

impl DnsHandler {
    pub fn new(
        engine: Arc<DecisionEngine>,
        next: Arc<dyn DnsResolver>,
        stats: Arc<StatsCollector>,
        logger: Arc<QueryLogger>,
    ) -> Self {
        Self {
            engine,
            next,
            stats,
            logger,
        }
    }

    fn get_query_info(&self, request: &Request) -> Option<QueryContext> {
        let query = request.queries().first()?;
        let qname = Name::from(query.name());

        Some(QueryContext {
            name: normalize_domain(&qname.to_ascii()),
            qname,
            qtype: query.query_type(),
            start: Instant::now(),
        })
    }

    async fn send<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        header: Header,
        answers: &[Record],
        soa: &[Record],
    ) -> ResponseInfo {
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], soa.iter(), &[]);
        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!("Failed to send response: {}", e);
                header.into()
            }
        }
    }

    async fn serve_blocked<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
        query: QueryContext,
        blocked: BlockedResponse,
    ) -> ResponseInfo {
        self.stats.inc_blocked();

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_recursion_available(true);
        header.set_response_code(blocked.response_code);

        let info = self
            .send(request, response_handle, header, &blocked.answers, &blocked.soa)
            .await;

        self.logger.log(QueryLogEntry {
            client_ip: request.src().ip(),
            domain: query.name,
            query_type: query.qtype.to_string(),
            action: QueryLogAction::Blocked,
            nxdomain: blocked.is_nxdomain(),
            upstream: None,
            latency_ms: query.start.elapsed().as_millis() as u64,
        });
        info
    }

    async fn resolve_and_serve<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
        query: QueryContext,
    ) -> ResponseInfo {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(false);

        let (info, action, upstream) = match self.next.resolve(&query.name, query.qtype).await {
            Ok(answer) => {
                self.stats.inc_forwarded();
                header.set_response_code(answer.response_code);
                let info = self
                    .send(request, response_handle, header, &answer.answers, &answer.authority)
                    .await;
                (info, QueryLogAction::Forwarded, answer.upstream)
            }
            Err(e) => {
                error!("Upstream resolution failed for {}: {}", query.name, e);
                self.stats.inc_upstream_failure();
                header.set_response_code(ResponseCode::ServFail);
                let info = self.send(request, response_handle, header, &[], &[]).await;
                (info, QueryLogAction::Failed, e.to_string())
            }
        };

        self.logger.log(QueryLogEntry {
            client_ip: request.src().ip(),
            domain: query.name,
            query_type: query.qtype.to_string(),
            action,
            nxdomain: false,
            upstream: Some(upstream),
            latency_ms: query.start.elapsed().as_millis() as u64,
        });
        info
    }
}

#[async_trait::async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        self.stats.inc_queries();

        let Some(query) = self.get_query_info(request) else {
            let mut header = Header::response_from_request(request.header());
            header.set_response_code(ResponseCode::FormErr);
            return self.send(request, response_handle, header, &[], &[]).await;
        };

        match self.engine.decide(&query.qname, &query.name, query.qtype) {
            Verdict::Block(blocked) => {
                self.serve_blocked(request, response_handle, query, blocked)
                    .await
            }
            Verdict::Allow => self.resolve_and_serve(request, response_handle, query).await,
        }
    }
}
