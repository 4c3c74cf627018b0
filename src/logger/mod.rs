pub mod console_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::types::{QueryLogAction, QueryLogEntry, QueryLogSink};

use crate::config::LoggingConfig;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hands query events to sink tasks so the query path never waits on output.
pub struct QueryLogger {
    sinks: Vec<mpsc::Sender<QueryLogEntry>>,
}

impl QueryLogger {
    pub fn new(config: LoggingConfig) -> Arc<Self> {
        let console: Box<dyn QueryLogSink> = Box::new(ConsoleLogSink::new(config));
        Self::with_sinks(vec![console])
    }

    pub fn with_sinks(sinks: Vec<Box<dyn QueryLogSink>>) -> Arc<Self> {
        let senders = sinks
            .into_iter()
            .map(|sink| {
                let (tx, mut rx) = mpsc::channel::<QueryLogEntry>(1000);
                tokio::spawn(async move {
                    while let Some(entry) = rx.recv().await {
                        sink.log(&entry);
                    }
                });
                tx
            })
            .collect();

        Arc::new(Self { sinks: senders })
    }

    pub fn log(&self, entry: QueryLogEntry) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        // Fire and forget, don't block caller if buffer full
        for sink in rest {
            let _ = sink.try_send(entry.clone());
        }
        let _ = last.try_send(entry);
    }
}
