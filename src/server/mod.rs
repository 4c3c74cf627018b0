mod handler;
mod types;

pub use self::handler::DnsHandler;
pub use self::types::QueryContext;
