//! # tracelens-enrich
//!
//! Hop enrichment: ASN (Team Cymru DNS), geolocation (ip-api.com), reverse
//! DNS, and the persistent cache that keeps repeat traces off the network.
//!
//! The orchestrator classifies each responder, reads the cache, fans the
//! missing lookups out concurrently and writes the results back through.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod asn;
mod cache;
mod error;
mod geo;
mod ptr;

pub use asn::AsnLookup;
pub use cache::{Cache, CacheEntry, DEFAULT_TTL};
pub use error::{EnrichError, EnrichResult};
pub use geo::{flag, GeoLookup};
pub use ptr::PtrResolver;

use std::time::Duration;
use tracelens_types::{EnrichedHop, GeoInfo, IpClass, RawHop};
use tracing::debug;

/// Per-hop enrichment orchestrator.
///
/// Owns the cache and the three lookup clients. Cache writes for a hop
/// complete before [`Enricher::enrich`] returns; the owner flushes the
/// cache at the end of the run.
pub struct Enricher {
    cache: Cache,
    asn: AsnLookup,
    geo: GeoLookup,
    ptr: PtrResolver,
    dns_enabled: bool,
    geo_enabled: bool,
}

impl Enricher {
    /// Creates an orchestrator over an opened cache.
    #[must_use]
    pub fn new(cache: Cache, dns_enabled: bool, geo_enabled: bool, timeout: Duration) -> Self {
        Self {
            cache,
            asn: AsnLookup::new(timeout),
            geo: GeoLookup::new(timeout),
            ptr: PtrResolver::new(timeout),
            dns_enabled,
            geo_enabled,
        }
    }

    /// Enriches one raw hop: classification, cache reads, concurrent
    /// lookups for whatever is still missing, write-through, and the
    /// ASN-country geolocation fallback.
    pub async fn enrich(&mut self, raw: &RawHop) -> EnrichedHop {
        let mut hop = EnrichedHop::from_raw(raw);
        let Some(ip) = hop.ip else {
            return hop;
        };

        let class = IpClass::of_addr(ip);
        hop.ip_class = Some(class);
        if let Some(tag) = class.tag() {
            hop.tag(tag);
        }
        if !class.should_enrich() {
            return hop;
        }

        let key = ip.to_string();
        let cached_asn = self.cache.get_asn(&key);
        let cached_geo = if self.geo_enabled {
            self.cache.get_geo(&key)
        } else {
            None
        };
        let cached_ptr = if self.dns_enabled {
            self.cache.get_ptr(&key)
        } else {
            None
        };

        let mut asn_info = cached_asn.clone();
        if let Some(ref asn) = cached_asn {
            hop.asn = Some(asn.asn.clone());
            hop.org = asn.org.clone();
        }
        hop.geo = cached_geo.clone();
        hop.ptr = cached_ptr.clone();

        let need_asn = cached_asn.is_none();
        let need_geo = self.geo_enabled && cached_geo.is_none();
        let need_ptr = self.dns_enabled && cached_ptr.is_none();

        if need_asn || need_geo || need_ptr {
            debug!(%ip, need_asn, need_geo, need_ptr, "cache miss, fetching");
            let Self { asn, geo, ptr, .. } = self;
            let (fetched_asn, fetched_geo, fetched_ptr) = tokio::join!(
                async {
                    if need_asn {
                        asn.lookup(ip).await
                    } else {
                        None
                    }
                },
                async {
                    if need_geo {
                        geo.lookup(ip).await
                    } else {
                        None
                    }
                },
                async {
                    if need_ptr {
                        ptr.resolve(ip).await
                    } else {
                        None
                    }
                },
            );

            if let Some(info) = fetched_asn {
                hop.asn = Some(info.asn.clone());
                hop.org = info.org.clone();
                self.cache.set(&key, Some(&info), None, None);
                asn_info = Some(info);
            }
            if let Some(geo) = fetched_geo {
                self.cache.set(&key, None, Some(&geo), None);
                hop.geo = Some(geo);
            }
            if let Some(ptr) = fetched_ptr {
                self.cache.set(&key, None, None, Some(&ptr));
                hop.ptr = Some(ptr);
            }
        }

        // Last-resort location from the ASN registration country; runs on
        // the fully-cached path too.
        if hop.geo.is_none() {
            if let Some(country) = asn_info.as_ref().and_then(|a| a.country.as_deref()) {
                hop.geo = Some(GeoInfo::from_country_code(country));
            }
        }

        hop
    }

    /// Flushes the cache if it changed.
    pub fn flush(&mut self) {
        self.cache.save();
    }
}
