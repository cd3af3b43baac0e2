//! Static record table answered by the fake nameserver.

use std::collections::HashMap;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use tracing::{debug, warn};

use crate::dns_question_and_answer::{DnsAnswer, RData, RecordType};
use crate::error::{ResolvError, Result};

/// TTL written on every fake answer.
pub const DEFAULT_TTL: u32 = 30;

/// CNAME indirections followed before resolution stops.
pub const MAX_CNAME_HOPS: usize = 8;

/// SRV defaults when a hosts line omits priority and weight.
const DEFAULT_SRV_PRIORITY: u16 = 1;
const DEFAULT_SRV_WEIGHT: u16 = 100;

/// Read-only mapping from owner name to the records it holds.
///
/// Lookups ignore ASCII case and a trailing dot.
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    records: HashMap<String, Vec<RData>>,
    default_a: Option<Ipv4Addr>,
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record for `name`. Records of one name keep insertion order.
    pub fn insert(&mut self, name: &str, rdata: RData) -> &mut Self {
        self.records.entry(normalize(name)).or_default().push(rdata);
        self
    }

    /// Answer otherwise unmatched A queries with `ip`.
    pub fn with_default_a(mut self, ip: Ipv4Addr) -> Self {
        self.default_a = Some(ip);
        self
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn lookup(&self, name: &str) -> &[RData] {
        self.records
            .get(&normalize(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve `(name, qtype)`, chasing CNAMEs for other types.
    ///
    /// The first record's owner name keeps the caller's spelling; later
    /// hops use the CNAME targets. An unknown name yields no answers.
    pub fn resolve(&self, name: &str, qtype: u16) -> Vec<DnsAnswer> {
        let mut answers = Vec::new();
        let mut current = name.trim_end_matches('.').to_string();

        for _ in 0..=MAX_CNAME_HOPS {
            let records = self.lookup(&current);

            let direct: Vec<&RData> = records
                .iter()
                .filter(|r| r.record_type().map(RecordType::to_u16) == Some(qtype))
                .collect();
            if !direct.is_empty() {
                answers.extend(
                    direct
                        .into_iter()
                        .map(|r| DnsAnswer::new(current.clone(), DEFAULT_TTL, r.clone())),
                );
                return answers;
            }

            let cname = records.iter().find_map(|r| match r {
                RData::Cname(target) if qtype != RecordType::CNAME.to_u16() => Some(target),
                _ => None,
            });
            match cname {
                Some(target) => {
                    answers.push(DnsAnswer::new(
                        current.clone(),
                        DEFAULT_TTL,
                        RData::Cname(target.clone()),
                    ));
                    current = target.trim_end_matches('.').to_string();
                }
                None => break,
            }
        }

        if answers.is_empty() && qtype == RecordType::A.to_u16() {
            if let Some(ip) = self.default_a {
                answers.push(DnsAnswer::new(current, DEFAULT_TTL, RData::A(ip)));
            }
        }
        answers
    }

    /// Load a fake hosts file. Lines that do not parse are logged and skipped.
    ///
    /// ```text
    /// A      cwrap.org             127.0.0.21
    /// AAAA   cwrap6.org            2a00:1450:4013:c01::63
    /// CNAME  rwrap.org             web.cwrap.org
    /// SRV    _ldap._tcp.cwrap.org  ldap.cwrap.org 389 1 5
    /// SOA    cwrap.org             ns1.cwrap.org admin.cwrap.org 2014100457 3600 300 1814400 600
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ResolvError::File`] if the file cannot be read.
    pub fn from_hosts_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ResolvError::file(path, e))?;
        let table = Self::from_hosts_str(&content);
        debug!(path = %path.display(), records = table.len(), "Loaded fake hosts file");
        Ok(table)
    }

    pub fn from_hosts_str(content: &str) -> Self {
        let mut table = Self::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_hosts_line(line) {
                Some((name, rdata)) => {
                    table.insert(name, rdata);
                }
                None => warn!(line = number + 1, content = %line, "Skipping malformed hosts line"),
            }
        }
        table
    }
}

fn parse_hosts_line(line: &str) -> Option<(&str, RData)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (&kind, &name, rest) = match fields.as_slice() {
        [kind, name, rest @ ..] if !rest.is_empty() => (kind, name, rest),
        _ => return None,
    };

    let rdata = match RecordType::from_name(kind)? {
        RecordType::A => RData::A(rest[0].parse::<Ipv4Addr>().ok()?),
        RecordType::AAAA => RData::Aaaa(rest[0].parse::<Ipv6Addr>().ok()?),
        RecordType::CNAME => RData::Cname(rest[0].to_string()),
        RecordType::SRV => {
            let (target, numbers) = rest.split_first()?;
            let port = numbers.first()?.parse().ok()?;
            let priority = match numbers.get(1) {
                Some(p) => p.parse().ok()?,
                None => DEFAULT_SRV_PRIORITY,
            };
            let weight = match numbers.get(2) {
                Some(w) => w.parse().ok()?,
                None => DEFAULT_SRV_WEIGHT,
            };
            RData::Srv {
                priority,
                weight,
                port,
                target: (*target).to_string(),
            }
        }
        RecordType::SOA => {
            let [mname, rname, serial, refresh, retry, expire, minimum] = rest else {
                return None;
            };
            RData::Soa {
                mname: (*mname).to_string(),
                rname: (*rname).to_string(),
                serial: serial.parse().ok()?,
                refresh: refresh.parse().ok()?,
                retry: retry.parse().ok()?,
                expire: expire.parse().ok()?,
                minimum: minimum.parse().ok()?,
            }
        }
        _ => return None,
    };

    Some((name, rdata))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &str = "\
# fake hosts
A      cwrap.org               127.0.0.21
AAAA   cwrap6.org              2a00:1450:4013:c01::63
CNAME  cwrap.org               therealcwrap.org
CNAME  rwrap.org               web.cwrap.org
CNAME  web.cwrap.org           www.cwrap.org
A      www.cwrap.org           127.0.0.22
SRV    _ldap._tcp.cwrap.org    ldap.cwrap.org 389 1 5
SRV    _krb5._tcp.cwrap.org    krb5.cwrap.org 88
SOA    cwrap.org               ns1.cwrap.org admin.cwrap.org 2014100457 3600 300 1814400 600
";

    fn table() -> RecordTable {
        RecordTable::from_hosts_str(HOSTS)
    }

    fn a() -> u16 {
        RecordType::A.to_u16()
    }

    #[test]
    fn a_record_lookup() {
        let answers = table().resolve("cwrap.org", a());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].rdata, RData::A(Ipv4Addr::new(127, 0, 0, 21)));
        assert_eq!(answers[0].ttl, DEFAULT_TTL);
    }

    #[test]
    fn lookup_is_repeatable() {
        let t = table();
        assert_eq!(t.resolve("cwrap.org", a()), t.resolve("cwrap.org", a()));
    }

    #[test]
    fn lookup_ignores_case_and_trailing_dot() {
        let t = table();
        let plain = t.resolve("cwrap.org", a());
        let upper = t.resolve("CWRAP.ORG", a());
        let dotted = t.resolve("cwrap.org.", a());
        assert_eq!(plain[0].rdata, upper[0].rdata);
        assert_eq!(plain, dotted);
    }

    #[test]
    fn direct_cname_query_not_chased() {
        let answers = table().resolve("cwrap.org", RecordType::CNAME.to_u16());
        assert_eq!(answers, vec![DnsAnswer::new(
            "cwrap.org",
            DEFAULT_TTL,
            RData::Cname("therealcwrap.org".to_string())
        )]);
    }

    #[test]
    fn cname_chain_followed() {
        let answers = table().resolve("rwrap.org", a());
        let names: Vec<&str> = answers.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["rwrap.org", "web.cwrap.org", "www.cwrap.org"]);
        assert_eq!(answers[0].rdata, RData::Cname("web.cwrap.org".to_string()));
        assert_eq!(answers[1].rdata, RData::Cname("www.cwrap.org".to_string()));
        assert_eq!(answers[2].rdata, RData::A(Ipv4Addr::new(127, 0, 0, 22)));
    }

    #[test]
    fn cname_cycle_is_bounded() {
        let mut t = RecordTable::new();
        t.insert("loop1.org", RData::Cname("loop2.org".to_string()))
            .insert("loop2.org", RData::Cname("loop1.org".to_string()));
        let answers = t.resolve("loop1.org", a());
        assert_eq!(answers.len(), MAX_CNAME_HOPS + 1);
    }

    #[test]
    fn missing_name_has_no_answers() {
        assert!(table().resolve("nosuchentry.org", a()).is_empty());
        assert!(table()
            .resolve("nosuchentry.org", RecordType::AAAA.to_u16())
            .is_empty());
    }

    #[test]
    fn srv_defaults_and_explicit_values() {
        let t = table();
        let ldap = t.resolve("_ldap._tcp.cwrap.org", RecordType::SRV.to_u16());
        assert_eq!(ldap[0].rdata, RData::Srv {
            priority: 1,
            weight: 5,
            port: 389,
            target: "ldap.cwrap.org".to_string(),
        });

        let krb5 = t.resolve("_krb5._tcp.cwrap.org", RecordType::SRV.to_u16());
        assert_eq!(krb5[0].rdata, RData::Srv {
            priority: 1,
            weight: 100,
            port: 88,
            target: "krb5.cwrap.org".to_string(),
        });
    }

    #[test]
    fn soa_and_aaaa_records() {
        let t = table();
        let soa = t.resolve("cwrap.org", RecordType::SOA.to_u16());
        assert!(matches!(&soa[0].rdata, RData::Soa { serial: 2014100457, minimum: 600, .. }));

        let aaaa = t.resolve("cwrap6.org", RecordType::AAAA.to_u16());
        assert_eq!(
            aaaa[0].rdata,
            RData::Aaaa("2a00:1450:4013:c01::63".parse().unwrap())
        );
    }

    #[test]
    fn malformed_hosts_lines_skipped() {
        let t = RecordTable::from_hosts_str("A bad.org 999.1.1.1\nMX mx.org mail.mx.org\nA\nA ok.org 10.0.0.1\n");
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn default_a_record() {
        let t = RecordTable::new().with_default_a(Ipv4Addr::new(127, 0, 10, 10));
        let answers = t.resolve("www.cwrap.org", a());
        assert_eq!(answers, vec![DnsAnswer::new_a_record("www.cwrap.org", DEFAULT_TTL, [127, 0, 10, 10])]);
        assert!(t.resolve("www.cwrap.org", RecordType::AAAA.to_u16()).is_empty());
    }
}
