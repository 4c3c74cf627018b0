use crate::config::LoggingConfig;
use crate::logger::types::{QueryLogAction, QueryLogEntry, QueryLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    pub fn should_log(&self, entry: &QueryLogEntry) -> bool {
        match entry.action {
            QueryLogAction::Blocked => self.config.log_blocked,
            _ => self.config.log_all_queries,
        }
    }
}

/// Text rendering of a query event.
pub fn format_entry(entry: &QueryLogEntry) -> String {
    match entry.action {
        QueryLogAction::Blocked => {
            let extra = if entry.nxdomain {
                ", responding with NXDOMAIN"
            } else {
                ""
            };
            format!(
                "Blocked request {:?} ({}) from {:?}{}",
                entry.domain, entry.query_type, entry.client_ip.to_string(), extra
            )
        }
        QueryLogAction::Forwarded => format!(
            "[{}] {} {} -> fetched from upstream {} [{}ms]",
            entry.query_type,
            entry.client_ip,
            entry.domain,
            entry.upstream.as_deref().unwrap_or("unknown"),
            entry.latency_ms
        ),
        QueryLogAction::Failed => format!(
            "[{}] {} {} -> upstream failed: {} [{}ms]",
            entry.query_type,
            entry.client_ip,
            entry.domain,
            entry.upstream.as_deref().unwrap_or("unknown error"),
            entry.latency_ms
        ),
    }
}

impl QueryLogSink for ConsoleLogSink {
    fn log(&self, entry: &QueryLogEntry) {
        if !self.should_log(entry) {
            return;
        }

        if self.config.format == "json" {
            info!(
                target: "dns_query",
                client = %entry.client_ip,
                domain = %entry.domain,
                r#type = %entry.query_type,
                action = ?entry.action,
                nxdomain = entry.nxdomain,
                upstream = ?entry.upstream,
                lat = %entry.latency_ms
            );
        } else {
            info!("{}", format_entry(entry));
        }
    }
}
