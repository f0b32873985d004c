//! Reverse-DNS (PTR) resolution.

use futures::future::join_all;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Reverse-DNS resolver with a per-call timeout.
pub struct PtrResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl PtrResolver {
    /// Creates a resolver using the system configuration.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        Self { resolver, timeout }
    }

    /// Resolves the PTR hostname for an address. Any failure yields `None`.
    pub async fn resolve(&self, ip: Ipv4Addr) -> Option<String> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(IpAddr::V4(ip)))
            .await
            .ok()?
            .ok()?;
        lookup
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
    }

    /// Resolves many addresses concurrently after deduplication.
    pub async fn resolve_many(&self, ips: &[Ipv4Addr]) -> HashMap<Ipv4Addr, Option<String>> {
        let unique: HashSet<Ipv4Addr> = ips.iter().copied().collect();
        let tasks = unique
            .into_iter()
            .map(|ip| async move { (ip, self.resolve(ip).await) });
        join_all(tasks).await.into_iter().collect()
    }
}
