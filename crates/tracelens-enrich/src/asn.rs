//! ASN lookup via the Team Cymru DNS service.
//!
//! Two TXT queries per address: `<reversed-ip>.origin.asn.cymru.com` maps
//! the IP to an ASN and announced prefix, `AS<asn>.asn.cymru.com` maps the
//! ASN to its description. Free, no API key, reliable.

use futures::future::join_all;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracelens_types::AsnInfo;
use tracing::debug;

const ORIGIN_SUFFIX: &str = "origin.asn.cymru.com.";
const ASN_SUFFIX: &str = "asn.cymru.com.";

/// Resolver for Team Cymru origin and AS-description records.
pub struct AsnLookup {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl AsnLookup {
    /// Creates a lookup client with the given per-query timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        Self { resolver, timeout }
    }

    /// Resolves ASN information for a single address. Any failure, empty
    /// answer or timeout yields `None`; the total budget is twice the
    /// per-query timeout to allow for both lookups.
    pub async fn lookup(&self, ip: Ipv4Addr) -> Option<AsnInfo> {
        match tokio::time::timeout(self.timeout * 2, self.lookup_inner(ip)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%ip, "ASN lookup timed out");
                None
            }
        }
    }

    async fn lookup_inner(&self, ip: Ipv4Addr) -> Option<AsnInfo> {
        let o = ip.octets();
        let origin_domain = format!("{}.{}.{}.{}.{ORIGIN_SUFFIX}", o[3], o[2], o[1], o[0]);
        let origin_txt = self.query_txt(&origin_domain).await?;
        let (asn, prefix, country) = parse_origin(&origin_txt)?;

        let asn_domain = format!("AS{asn}.{ASN_SUFFIX}");
        let org = match self.query_txt(&asn_domain).await {
            Some(txt) => parse_description(&txt),
            None => None,
        };

        Some(AsnInfo {
            asn: format!("AS{asn}"),
            org,
            prefix,
            country,
        })
    }

    async fn query_txt(&self, domain: &str) -> Option<String> {
        let answer = self.resolver.txt_lookup(domain).await.ok()?;
        answer.iter().next().map(|record| {
            record
                .txt_data()
                .iter()
                .map(|data| String::from_utf8_lossy(data))
                .collect::<String>()
        })
    }

    /// Resolves many addresses concurrently after deduplication. Individual
    /// failures land as `None`; the call itself never fails.
    pub async fn lookup_many(&self, ips: &[Ipv4Addr]) -> HashMap<Ipv4Addr, Option<AsnInfo>> {
        let unique: HashSet<Ipv4Addr> = ips.iter().copied().collect();
        let tasks = unique
            .into_iter()
            .map(|ip| async move { (ip, self.lookup(ip).await) });
        join_all(tasks).await.into_iter().collect()
    }
}

/// Parses an origin record: `ASN | Prefix | CC | Registry | Date`.
///
/// Multi-origin answers carry space-separated numbers in the first field;
/// the whole field is kept as the ASN token.
fn parse_origin(txt: &str) -> Option<(String, Option<String>, Option<String>)> {
    let parts: Vec<&str> = txt.trim_matches('"').split('|').map(str::trim).collect();
    if parts.len() < 3 || parts[0].is_empty() {
        return None;
    }
    Some((
        parts[0].to_string(),
        non_empty(parts[1]),
        non_empty(parts[2]),
    ))
}

/// Parses an AS record: `ASN | CC | Registry | Date | Description`.
fn parse_description(txt: &str) -> Option<String> {
    let parts: Vec<&str> = txt.trim_matches('"').split('|').map(str::trim).collect();
    if parts.len() < 5 {
        return None;
    }
    non_empty(parts[4])
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_origin_record() {
        let (asn, prefix, country) =
            parse_origin("15169 | 8.8.8.0/24 | US | arin | 1992-12-01").unwrap();
        assert_eq!(asn, "15169");
        assert_eq!(prefix.as_deref(), Some("8.8.8.0/24"));
        assert_eq!(country.as_deref(), Some("US"));
    }

    #[test]
    fn multi_origin_keeps_whole_token() {
        let (asn, _, _) = parse_origin("15169 396982 | 8.8.8.0/24 | US | arin | ").unwrap();
        assert_eq!(asn, "15169 396982");
    }

    #[test]
    fn short_or_empty_records_are_rejected() {
        assert!(parse_origin("").is_none());
        assert!(parse_origin("15169 | 8.8.8.0/24").is_none());
        assert!(parse_origin(" | 8.8.8.0/24 | US").is_none());
    }

    #[test]
    fn parses_description_record() {
        let org = parse_description("15169 | US | arin | 2000-03-30 | GOOGLE, US").unwrap();
        assert_eq!(org, "GOOGLE, US");
    }

    #[test]
    fn description_requires_five_fields() {
        assert!(parse_description("15169 | US | arin | 2000-03-30").is_none());
    }

    #[test]
    fn quoted_records_are_unwrapped() {
        let (asn, _, _) = parse_origin("\"13335 | 1.1.1.0/24 | US | arin | 2010-07-14\"").unwrap();
        assert_eq!(asn, "13335");
    }
}
