use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Names that hosts files carry for the local machine. Never blocklist entries.
const HOSTS_HOUSEKEEPING: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
    "0.0.0.0",
];

const MAX_NAME_LEN: usize = 253;

/// Exact-match set of blocked domain names.
///
/// Keys are normalized with [`normalize_domain`]. A published map is never
/// mutated; refreshes build a new one and swap the reference.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockMap {
    names: FxHashSet<Box<str>>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from already-normalized entries, dropping duplicates.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Box<str>>,
    {
        Self {
            names: entries.into_iter().collect(),
        }
    }

    /// Exact membership. `name` must already be normalized.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| &**n)
    }
}

impl FromIterator<Box<str>> for BlockMap {
    fn from_iter<T: IntoIterator<Item = Box<str>>>(iter: T) -> Self {
        Self::from_entries(iter)
    }
}

/// Lower-cases a query or list name and strips the trailing root separator.
pub fn normalize_domain(name: &str) -> String {
    let mut name = name.trim().trim_end_matches('.').to_string();
    name.make_ascii_lowercase();
    name
}

/// Outcome of parsing one list line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedLine {
    /// Comment or blank line.
    Skip,
    /// Accepted names, plus the invalid names dropped from the same line.
    Domains { names: Vec<Box<str>>, dropped: usize },
    Malformed,
}

/// Parses one line of a plain domain list or a hosts file.
///
/// Accepts `domain`, `0.0.0.0 domain` and `<ip> domain [domain...]`. An invalid
/// name on a hosts line is dropped on its own; its siblings are kept.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() || line.starts_with('!') {
        return ParsedLine::Skip;
    }

    let mut tokens = line.split_whitespace();
    let first = match tokens.next() {
        Some(t) => t,
        None => return ParsedLine::Skip,
    };

    let candidates: Vec<&str> = if first.parse::<IpAddr>().is_ok() {
        tokens.collect()
    } else if tokens.next().is_none() {
        vec![first]
    } else {
        return ParsedLine::Malformed;
    };

    let mut names = Vec::with_capacity(candidates.len());
    let mut dropped = 0;
    for candidate in candidates {
        let name = normalize_domain(candidate);
        if HOSTS_HOUSEKEEPING.contains(&name.as_str()) {
            continue;
        }
        if is_valid_name(&name) {
            names.push(name.into_boxed_str());
        } else {
            dropped += 1;
        }
    }

    match (names.is_empty(), dropped) {
        (true, 0) => ParsedLine::Skip,
        (true, _) => ParsedLine::Malformed,
        (false, dropped) => ParsedLine::Domains { names, dropped },
    }
}

/// Entries collected from a list body, fed one line at a time.
#[derive(Debug, Default)]
pub struct ListEntries {
    pub entries: Vec<Box<str>>,
    /// Malformed lines and invalid names skipped so far.
    pub dropped: usize,
}

impl ListEntries {
    pub fn push_line(&mut self, line: &str) {
        match parse_line(line) {
            ParsedLine::Domains { names, dropped } => {
                self.entries.extend(names);
                self.dropped += dropped;
            }
            ParsedLine::Malformed => self.dropped += 1,
            ParsedLine::Skip => {}
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'*')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(s: &str) -> Box<str> {
        s.to_string().into_boxed_str()
    }

    #[test]
    fn test_exact_membership_only() {
        let map = BlockMap::from_entries(vec![boxed("ads.example.com"), boxed("tracker.net")]);

        assert!(map.contains("ads.example.com"));
        assert!(map.contains("tracker.net"));

        // No suffix or prefix matching
        assert!(!map.contains("sub.ads.example.com"));
        assert!(!map.contains("example.com"));
        assert!(!map.contains("tracker.net.evil"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_empty_map_blocks_nothing() {
        let map = BlockMap::new();
        assert!(map.is_empty());
        assert!(!map.contains("ads.example.com"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let map: BlockMap = vec![boxed("a.com"), boxed("a.com"), boxed("b.com")]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("Ads.Example.COM."), "ads.example.com");
        assert_eq!(normalize_domain("  tracker.net  "), "tracker.net");
        assert_eq!(normalize_domain("."), "");
    }

    fn domains(names: &[&str]) -> ParsedLine {
        ParsedLine::Domains {
            names: names.iter().map(|n| boxed(n)).collect(),
            dropped: 0,
        }
    }

    #[test]
    fn test_parse_hosts_and_plain_lines() {
        assert_eq!(parse_line("0.0.0.0 ads.example.com"), domains(&["ads.example.com"]));
        assert_eq!(
            parse_line("127.0.0.1  Tracker.Example.com.  # inline"),
            domains(&["tracker.example.com"])
        );
        assert_eq!(parse_line("::1 a.com b.com"), domains(&["a.com", "b.com"]));
        assert_eq!(parse_line("justadomain.com"), domains(&["justadomain.com"]));
        assert_eq!(parse_line("# comment"), ParsedLine::Skip);
        assert_eq!(parse_line("! adblock comment"), ParsedLine::Skip);
        assert_eq!(parse_line("   "), ParsedLine::Skip);
        assert_eq!(parse_line("127.0.0.1 localhost"), ParsedLine::Skip);
        assert_eq!(parse_line("two words.com here.com"), ParsedLine::Malformed);
        assert_eq!(parse_line("bad..name.com"), ParsedLine::Malformed);
        assert_eq!(parse_line("0.0.0.0 bad/name"), ParsedLine::Malformed);
    }

    #[test]
    fn test_invalid_hosts_token_keeps_siblings() {
        assert_eq!(
            parse_line("0.0.0.0 good.example.com bad/name other.example.net"),
            ParsedLine::Domains {
                names: vec![boxed("good.example.com"), boxed("other.example.net")],
                dropped: 1,
            }
        );
        assert_eq!(parse_line("0.0.0.0 localhost bad..name"), ParsedLine::Malformed);
    }

    #[test]
    fn test_list_entries_count_dropped() {
        let content = "
        # StevenBlack style
        0.0.0.0 ads.example.com
        0.0.0.0 0.0.0.0
        0.0.0.0 pixel.example.com in/valid
        adserver.net
        not a domain
        ";

        let mut list = ListEntries::default();
        for line in content.lines() {
            list.push_line(line);
        }
        assert_eq!(
            list.entries,
            vec![
                boxed("ads.example.com"),
                boxed("pixel.example.com"),
                boxed("adserver.net")
            ]
        );
        assert_eq!(list.dropped, 2);
    }
}
