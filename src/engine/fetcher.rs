use super::blockmap::ListEntries;
use super::traits::SourceFetcher;
use crate::error::{BlocklistError, Result};
use reqwest::Client;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info};

/// Fetches `http(s)://` sources with reqwest and `file://` or plain-path
/// sources from disk. Parsing runs on the blocking pool.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ads-filter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BlocklistError::source_fetch("http client", e))?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<Box<str>>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BlocklistError::source_fetch(url, e))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| BlocklistError::source_fetch(url, e))?;

        let locator = url.to_string();
        parse_blocking(move || read_entries(&locator, &body[..])).await
    }

    async fn fetch_file(&self, locator: &str, path: PathBuf) -> Result<Vec<Box<str>>> {
        let locator = locator.to_string();
        parse_blocking(move || {
            let file = std::fs::File::open(&path)
                .map_err(|e| BlocklistError::source_fetch(locator.as_str(), e))?;
            read_entries(&locator, BufReader::new(file))
        })
        .await
    }
}

#[async_trait::async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<Box<str>>> {
        info!("Fetching blocklist {}", locator);
        if locator.starts_with("http://") || locator.starts_with("https://") {
            return self.fetch_http(locator).await;
        }
        let path = match url::Url::parse(locator) {
            Ok(u) if u.scheme() == "file" => u
                .to_file_path()
                .map_err(|_| BlocklistError::source_fetch(locator, "not a local file URL"))?,
            Ok(u) if u.scheme().len() > 1 => {
                return Err(BlocklistError::source_fetch(
                    locator,
                    format!("unsupported scheme {:?}", u.scheme()),
                ))
            }
            // Bare paths, including Windows drive letters.
            _ => PathBuf::from(locator),
        };
        self.fetch_file(locator, path).await
    }
}

async fn parse_blocking<F>(parse: F) -> Result<Vec<Box<str>>>
where
    F: FnOnce() -> Result<Vec<Box<str>>> + Send + 'static,
{
    tokio::task::spawn_blocking(parse).await.map_err(|e| {
        BlocklistError::io("blocklist parse task failed", std::io::Error::other(e))
    })?
}

/// Reads a list body line by line. Lines that are not valid UTF-8 are decoded
/// lossily, so a stray byte only costs the entry it appears in.
fn read_entries<R: BufRead>(locator: &str, reader: R) -> Result<Vec<Box<str>>> {
    let mut list = ListEntries::default();
    for line in reader.split(b'\n') {
        let line = line.map_err(|e| BlocklistError::source_fetch(locator, e))?;
        list.push_line(&String::from_utf8_lossy(&line));
    }

    if list.dropped > 0 {
        debug!("Dropped {} malformed entries from {}", list.dropped, locator);
    }
    info!("Parsed {} entries from {}", list.entries.len(), locator);
    Ok(list.entries)
}
