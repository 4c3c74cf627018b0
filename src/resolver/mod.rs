pub mod single;
pub mod types;

use crate::config::Config;
use anyhow::{bail, Context, Result};
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::Resolver;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use url::Url;

use self::single::SingleResolver;
pub use self::types::{DnsResolver, Upstream, UpstreamAnswer};

/// Builds the forwarding stage from `config.upstream`.
pub fn create_resolver(config: &Config) -> Result<Arc<dyn DnsResolver>> {
    let (socket_addr, protocol) = parse_upstream(&config.upstream)?;

    let mut resolver_config = ResolverConfig::new();
    resolver_config.add_name_server(NameServerConfig::new(socket_addr, protocol));

    let mut opts = ResolverOpts::default();
    // Responses are not cached by the filter
    opts.cache_size = 0;
    opts.timeout = std::time::Duration::from_millis(config.upstream_timeout_ms);

    let resolver =
        Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();

    info!("Forwarding allowed queries to {} ({})", config.upstream, socket_addr);

    Ok(Arc::new(SingleResolver {
        upstream: Upstream {
            url: config.upstream.clone(),
            resolver,
        },
    }))
}

/// Parses `udp://ip[:port]`, `tcp://ip[:port]` or a bare `ip[:port]`.
pub fn parse_upstream(upstream: &str) -> Result<(SocketAddr, Protocol)> {
    if let Ok(addr) = upstream.parse::<SocketAddr>() {
        return Ok((addr, Protocol::Udp));
    }
    if let Ok(ip) = upstream.parse::<IpAddr>() {
        return Ok((SocketAddr::new(ip, 53), Protocol::Udp));
    }

    let url = Url::parse(upstream).context("Failed to parse upstream URL")?;
    let protocol = match url.scheme() {
        "udp" => Protocol::Udp,
        "tcp" => Protocol::Tcp,
        other => bail!("Unsupported upstream scheme '{}'", other),
    };

    let host = url
        .host_str()
        .context("Upstream URL has no host")?
        .trim_start_matches('[')
        .trim_end_matches(']');
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("Upstream host '{}' must be an IP address", host))?;

    Ok((SocketAddr::new(ip, url.port().unwrap_or(53)), protocol))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upstream_forms() {
        let (addr, proto) = parse_upstream("udp://8.8.8.8:53").unwrap();
        assert_eq!(addr, "8.8.8.8:53".parse().unwrap());
        assert_eq!(proto, Protocol::Udp);

        let (addr, proto) = parse_upstream("tcp://1.1.1.1").unwrap();
        assert_eq!(addr, "1.1.1.1:53".parse().unwrap());
        assert_eq!(proto, Protocol::Tcp);

        let (addr, _) = parse_upstream("9.9.9.9:5353").unwrap();
        assert_eq!(addr.port(), 5353);

        let (addr, _) = parse_upstream("udp://[2606:4700::1111]:53").unwrap();
        assert!(addr.is_ipv6());

        assert!(parse_upstream("h3://dns.google/dns-query").is_err());
        assert!(parse_upstream("udp://dns.google:53").is_err());
    }
}
