use super::blockmap::BlockMap;
use super::rules::RuleSet;
use super::traits::BlockListStore;
use crate::config::ResponseConfig;
use hickory_server::proto::op::ResponseCode;
use hickory_server::proto::rr::rdata::{A, AAAA, SOA};
use hickory_server::proto::rr::{Name, RData, Record, RecordType};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

const SOA_TTL: u32 = 60;
const SOA_SERIAL: u32 = 1_524_370_381;
const SOA_REFRESH: i32 = 14_400;
const SOA_RETRY: i32 = 3_600;
const SOA_EXPIRE: i32 = 604_800;
const SOA_MINIMUM: u32 = 60;

/// The block/allow law. Whitelisting overrides blocklist membership and
/// blacklist rules.
#[inline]
pub fn is_blocked(rules: &RuleSet, map: &BlockMap, name: &str) -> bool {
    !rules.is_whitelisted(name) && (map.contains(name) || rules.is_blacklisted(name))
}

/// How a blocked query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    NxDomain,
    Sinkhole { ipv4: Ipv4Addr, ipv6: Ipv6Addr, ttl: u32 },
}

impl From<&ResponseConfig> for BlockMode {
    fn from(config: &ResponseConfig) -> Self {
        if config.nxdomain {
            Self::NxDomain
        } else {
            Self::Sinkhole {
                ipv4: config.target_ipv4,
                ipv6: config.target_ipv6,
                ttl: config.sinkhole_ttl,
            }
        }
    }
}

/// Synthesized answer for a blocked query.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedResponse {
    pub response_code: ResponseCode,
    pub answers: Vec<Record>,
    /// Authority section; carries the synthetic SOA for NXDOMAIN.
    pub soa: Vec<Record>,
}

impl BlockedResponse {
    pub fn is_nxdomain(&self) -> bool {
        self.response_code == ResponseCode::NXDomain
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Hand the query to the next stage of the pipeline.
    Allow,
    Block(BlockedResponse),
}

/// Per-query entry point. Reads the store's currently published blocklist
/// and rules without taking locks.
pub struct DecisionEngine {
    store: Arc<dyn BlockListStore>,
    mode: BlockMode,
}

impl DecisionEngine {
    pub fn new(store: Arc<dyn BlockListStore>, mode: BlockMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> BlockMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn BlockListStore> {
        &self.store
    }

    /// Verdict for a name already passed through [`normalize_domain`].
    ///
    /// [`normalize_domain`]: super::blockmap::normalize_domain
    pub fn is_blocked(&self, name: &str) -> bool {
        self.store.is_blocked(name)
    }

    /// Decides a query. `name` is `qname` normalized; the answer records are
    /// owned by `qname` as asked.
    pub fn decide(&self, qname: &Name, name: &str, qtype: RecordType) -> Verdict {
        if !self.is_blocked(name) {
            return Verdict::Allow;
        }

        let mut zone = qname.clone();
        zone.set_fqdn(true);

        let response = match self.mode {
            BlockMode::NxDomain => BlockedResponse {
                response_code: ResponseCode::NXDomain,
                answers: Vec::new(),
                soa: vec![synthetic_soa(&zone)],
            },
            BlockMode::Sinkhole { ipv4, ipv6, ttl } => {
                let rdata = match qtype {
                    RecordType::AAAA => RData::AAAA(AAAA(ipv6)),
                    _ => RData::A(A(ipv4)),
                };
                BlockedResponse {
                    response_code: ResponseCode::NoError,
                    answers: vec![Record::from_rdata(zone, ttl, rdata)],
                    soa: Vec::new(),
                }
            }
        };
        Verdict::Block(response)
    }
}

fn synthetic_soa(zone: &Name) -> Record {
    let mname = zone.prepend_label("ns1").unwrap_or_else(|_| zone.clone());
    let rname = zone.prepend_label("postmaster").unwrap_or_else(|_| zone.clone());
    let soa = SOA::new(
        mname,
        rname,
        SOA_SERIAL,
        SOA_REFRESH,
        SOA_RETRY,
        SOA_EXPIRE,
        SOA_MINIMUM,
    );
    Record::from_rdata(zone.clone(), SOA_TTL, RData::SOA(soa))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{normalize_domain, StoredBlocklistConfiguration};
    use crate::store::InMemoryStore;

    fn sinkhole() -> BlockMode {
        BlockMode::Sinkhole {
            ipv4: Ipv4Addr::new(10, 1, 33, 7),
            ipv6: "fe80::9cbd:c3ff:fe28:e133".parse().unwrap(),
            ttl: 3600,
        }
    }

    async fn store_with(names: &[&str]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new(RuleSet::new()));
        let map = BlockMap::from_entries(names.iter().map(|n| Box::from(*n)));
        store
            .publish(StoredBlocklistConfiguration::new(0, vec![], Arc::new(map)))
            .await
            .unwrap();
        store
    }

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn decide(engine: &DecisionEngine, qname: &str, qtype: RecordType) -> Verdict {
        let qname = name(qname);
        engine.decide(&qname, &normalize_domain(&qname.to_ascii()), qtype)
    }

    #[test]
    fn test_precedence_law() {
        let map = BlockMap::from_entries(vec![Box::from("listed.com"), Box::from("both.com")]);
        let mut rules = RuleSet::new();
        rules.add_blacklist_rule("ruled.com");
        rules.add_whitelist_rule("both.com");
        rules.add_regex_whitelist_rule(r"^safe\.").unwrap();
        rules.add_regex_blacklist_rule(r"safe").unwrap();

        assert!(is_blocked(&rules, &map, "listed.com"));
        assert!(is_blocked(&rules, &map, "ruled.com"));
        assert!(is_blocked(&rules, &map, "unsafe.net"));
        assert!(!is_blocked(&rules, &map, "both.com"));
        assert!(!is_blocked(&rules, &map, "safe.ruled.com"));
        assert!(!is_blocked(&rules, &map, "clean.org"));
    }

    #[tokio::test]
    async fn test_sinkhole_a_record() {
        let store = store_with(&["ads.example.com"]).await;
        let engine = DecisionEngine::new(store, sinkhole());

        let Verdict::Block(resp) = decide(&engine, "ads.example.com.", RecordType::A) else {
            panic!("expected block");
        };
        assert_eq!(resp.response_code, ResponseCode::NoError);
        assert!(resp.soa.is_empty());
        assert_eq!(resp.answers.len(), 1);
        let record = &resp.answers[0];
        assert_eq!(record.name(), &name("ads.example.com."));
        assert_eq!(record.data(), &RData::A(A(Ipv4Addr::new(10, 1, 33, 7))));
        assert_eq!(record.ttl(), 3600);
    }

    #[tokio::test]
    async fn test_sinkhole_aaaa_and_other_types() {
        let store = store_with(&["ads.example.com"]).await;
        let engine = DecisionEngine::new(store, sinkhole());

        let Verdict::Block(resp) = decide(&engine, "ADS.example.com", RecordType::AAAA) else {
            panic!("expected block");
        };
        assert_eq!(resp.answers[0].record_type(), RecordType::AAAA);

        let Verdict::Block(resp) = decide(&engine, "ads.example.com.", RecordType::MX) else {
            panic!("expected block");
        };
        assert_eq!(resp.answers[0].record_type(), RecordType::A);
    }

    #[tokio::test]
    async fn test_whitelist_allows_listed_name() {
        let store = store_with(&["ads.example.com"]).await;
        store.add_whitelist_rule("ads.example.com").unwrap();
        let engine = DecisionEngine::new(store, sinkhole());

        assert_eq!(decide(&engine, "ads.example.com.", RecordType::A), Verdict::Allow);
    }

    #[tokio::test]
    async fn test_nxdomain_response_has_soa_only() {
        let store = store_with(&[]).await;
        store.add_blacklist_rule("bad.example.com").unwrap();
        let engine = DecisionEngine::new(store, BlockMode::NxDomain);

        let Verdict::Block(resp) = decide(&engine, "bad.example.com.", RecordType::A) else {
            panic!("expected block");
        };
        assert!(resp.is_nxdomain());
        assert!(resp.answers.is_empty());
        assert_eq!(resp.soa.len(), 1);

        let soa_record = &resp.soa[0];
        assert_eq!(soa_record.name(), &name("bad.example.com."));
        assert_eq!(soa_record.ttl(), 60);
        let RData::SOA(soa) = soa_record.data() else {
            panic!("expected SOA rdata");
        };
        assert_eq!(soa.mname(), &name("ns1.bad.example.com."));
        assert_eq!(soa.rname(), &name("postmaster.bad.example.com."));
        assert_eq!(soa.serial(), SOA_SERIAL);
        assert_eq!(soa.minimum(), 60);
    }

    #[tokio::test]
    async fn test_unlisted_name_is_allowed() {
        let store = store_with(&["ads.example.com"]).await;
        let engine = DecisionEngine::new(store, BlockMode::NxDomain);
        assert_eq!(decide(&engine, "example.com.", RecordType::A), Verdict::Allow);
        assert!(!engine.is_blocked("sub.ads.example.com"));
        assert!(engine.is_blocked(&normalize_domain("Ads.Example.com.")));
    }
}
