use hickory_server::proto::rr::{Name, RecordType};
use std::time::Instant;

#[derive(Clone)]
pub struct QueryContext {
    /// Query name as received, used for answer records.
    pub qname: Name,
    /// Lower-cased, without the trailing root separator.
    pub name: String,
    pub qtype: RecordType,
    pub start: Instant,
}
