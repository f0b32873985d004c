//! Geographic IP lookup via ip-api.com.
//!
//! The free tier allows roughly 45 requests per minute, which the batch
//! endpoint keeps us well under for a single trace.

use crate::error::{EnrichError, EnrichResult};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracelens_types::GeoInfo;
use tracing::debug;

const API_URL: &str = "http://ip-api.com/json";
const BATCH_URL: &str = "http://ip-api.com/batch";
const FIELDS: &str = "status,country,countryCode,city,lat,lon";

/// The batch endpoint accepts at most this many addresses per request.
const BATCH_LIMIT: usize = 100;

/// Geolocation client with batch lookup and per-IP fallback.
pub struct GeoLookup {
    client: Option<Client>,
    timeout: Duration,
}

impl GeoLookup {
    /// Creates a lazy client; no connection is made until the first lookup.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: None,
            timeout,
        }
    }

    fn client(&mut self) -> EnrichResult<&Client> {
        match self.client {
            Some(ref client) => Ok(client),
            None => {
                let client = Client::builder()
                    .timeout(self.timeout)
                    .user_agent(concat!("tracelens/", env!("CARGO_PKG_VERSION")))
                    .build()?;
                Ok(self.client.insert(client))
            }
        }
    }

    /// Looks up a single address. Any failure yields `None`.
    pub async fn lookup(&mut self, ip: Ipv4Addr) -> Option<GeoInfo> {
        let client = self.client().ok()?.clone();
        fetch_one(&client, ip).await
    }

    /// Looks up many addresses, deduplicated, via the batch endpoint with a
    /// per-IP fallback on batch failure. Chunks pause at least a second
    /// apart to respect the free-tier rate limit.
    pub async fn lookup_many(&mut self, ips: &[Ipv4Addr]) -> HashMap<Ipv4Addr, Option<GeoInfo>> {
        let unique: Vec<Ipv4Addr> = ips
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let mut results = HashMap::new();

        for (i, chunk) in unique.chunks(BATCH_LIMIT).enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            match self.batch_lookup(chunk).await {
                Ok(chunk_results) => results.extend(chunk_results),
                Err(e) => {
                    debug!(error = %e, "batch geo lookup failed, falling back to per-IP");
                    results.extend(self.individual_lookups(chunk).await);
                }
            }
        }
        results
    }

    async fn batch_lookup(
        &mut self,
        ips: &[Ipv4Addr],
    ) -> EnrichResult<HashMap<Ipv4Addr, Option<GeoInfo>>> {
        let client = self.client()?;
        let query: Vec<serde_json::Value> = ips
            .iter()
            .map(|ip| serde_json::json!({ "query": ip.to_string(), "fields": FIELDS }))
            .collect();

        let response = client.post(BATCH_URL).json(&query).send().await?;
        if !response.status().is_success() {
            return Err(EnrichError::Api(format!("status {}", response.status())));
        }
        let records: Vec<GeoRecord> = response.json().await?;

        let mut results: HashMap<Ipv4Addr, Option<GeoInfo>> =
            ips.iter().map(|ip| (*ip, None)).collect();
        for record in records {
            let Some(ip) = record.query.as_deref().and_then(|q| q.parse().ok()) else {
                continue;
            };
            results.insert(ip, record.into_info());
        }
        Ok(results)
    }

    async fn individual_lookups(
        &mut self,
        ips: &[Ipv4Addr],
    ) -> HashMap<Ipv4Addr, Option<GeoInfo>> {
        let Ok(client) = self.client().map(Client::clone) else {
            return ips.iter().map(|ip| (*ip, None)).collect();
        };
        let tasks = ips.iter().map(|&ip| {
            let client = client.clone();
            async move { (ip, fetch_one(&client, ip).await) }
        });
        join_all(tasks).await.into_iter().collect()
    }

    /// Releases the HTTP client.
    pub fn close(&mut self) {
        self.client = None;
    }
}

async fn fetch_one(client: &Client, ip: Ipv4Addr) -> Option<GeoInfo> {
    let url = format!("{API_URL}/{ip}?fields={FIELDS}");
    let response = client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let record: GeoRecord = response.json().await.ok()?;
    record.into_info()
}

/// ip-api.com response record.
#[derive(Debug, Deserialize)]
struct GeoRecord {
    status: Option<String>,
    query: Option<String>,
    country: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl GeoRecord {
    fn into_info(self) -> Option<GeoInfo> {
        if self.status.as_deref() != Some("success") {
            return None;
        }
        Some(GeoInfo {
            country: self.country,
            country_code: self.country_code,
            city: self.city,
            lat: self.lat,
            lon: self.lon,
        })
    }
}

/// Country code to flag emoji mapping for the console renderer.
const COUNTRY_FLAGS: &[(&str, &str)] = &[
    ("CN", "🇨🇳"), ("US", "🇺🇸"), ("JP", "🇯🇵"), ("KR", "🇰🇷"), ("HK", "🇭🇰"),
    ("TW", "🇹🇼"), ("SG", "🇸🇬"), ("DE", "🇩🇪"), ("GB", "🇬🇧"), ("FR", "🇫🇷"),
    ("NL", "🇳🇱"), ("RU", "🇷🇺"), ("AU", "🇦🇺"), ("CA", "🇨🇦"), ("IN", "🇮🇳"),
    ("BR", "🇧🇷"), ("IT", "🇮🇹"), ("ES", "🇪🇸"), ("SE", "🇸🇪"), ("NO", "🇳🇴"),
    ("FI", "🇫🇮"), ("DK", "🇩🇰"), ("PL", "🇵🇱"), ("CZ", "🇨🇿"), ("AT", "🇦🇹"),
    ("CH", "🇨🇭"), ("BE", "🇧🇪"), ("IE", "🇮🇪"), ("NZ", "🇳🇿"), ("MX", "🇲🇽"),
    ("AR", "🇦🇷"), ("CL", "🇨🇱"), ("CO", "🇨🇴"), ("ZA", "🇿🇦"), ("EG", "🇪🇬"),
    ("AE", "🇦🇪"), ("IL", "🇮🇱"), ("TR", "🇹🇷"), ("TH", "🇹🇭"), ("VN", "🇻🇳"),
    ("ID", "🇮🇩"), ("MY", "🇲🇾"), ("PH", "🇵🇭"), ("UA", "🇺🇦"), ("RO", "🇷🇴"),
    ("GR", "🇬🇷"), ("PT", "🇵🇹"), ("HU", "🇭🇺"), ("BG", "🇧🇬"), ("SK", "🇸🇰"),
];

/// Flag emoji for a country code; a globe for codes outside the table.
#[must_use]
pub fn flag(country_code: &str) -> &'static str {
    if country_code.is_empty() {
        return "";
    }
    let upper = country_code.to_ascii_uppercase();
    COUNTRY_FLAGS
        .iter()
        .find(|(code, _)| *code == upper)
        .map_or("🌍", |(_, flag)| flag)
}
