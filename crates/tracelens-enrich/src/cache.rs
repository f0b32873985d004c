//! Persistent JSON file cache for enrichment data.
//!
//! A single document at `~/.tracelens/cache.json` maps IP strings to flat
//! entries with a write timestamp. No database, no locking; the tool runs
//! one process per cache file and saving is best-effort.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracelens_types::{AsnInfo, GeoInfo};
use tracing::debug;

/// Default entry lifetime: 7 days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// One cached record, keyed by IP string. All enrichment fields are
/// optional; `_ts` is the time of the last write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// UNIX timestamp of the last write
    #[serde(rename = "_ts", default)]
    pub ts: f64,
    /// ASN identifier ("AS" + number)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    /// Organization description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Announced prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// ASN registration country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_country: Option<String>,
    /// Geolocation country name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_country: Option<String>,
    /// Geolocation country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_country_code: Option<String>,
    /// Geolocation city
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_city: Option<String>,
    /// Geolocation latitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_lat: Option<f64>,
    /// Geolocation longitude
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_lon: Option<f64>,
    /// Reverse-DNS hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptr: Option<String>,
}

impl CacheEntry {
    fn asn_info(&self) -> Option<AsnInfo> {
        self.asn.as_ref().map(|asn| AsnInfo {
            asn: asn.clone(),
            org: self.org.clone(),
            prefix: self.prefix.clone(),
            country: self.asn_country.clone(),
        })
    }

    fn geo_info(&self) -> Option<GeoInfo> {
        self.geo_country.as_ref()?;
        Some(GeoInfo {
            country: self.geo_country.clone(),
            country_code: self.geo_country_code.clone(),
            city: self.geo_city.clone(),
            lat: self.geo_lat,
            lon: self.geo_lon,
        })
    }
}

/// Persistent enrichment cache with per-entry TTL.
///
/// A TTL of zero disables reads (every `get` misses) while writes are still
/// recorded; this implements the no-cache run.
pub struct Cache {
    path: PathBuf,
    ttl: Duration,
    data: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl Cache {
    /// Opens the cache at the default location under the home directory.
    #[must_use]
    pub fn open_default(ttl: Duration) -> Self {
        Self::open(default_path(), ttl)
    }

    /// Opens a cache document at `path`. A missing or malformed file yields
    /// an empty cache; expired entries are swept on load.
    #[must_use]
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let mut cache = Self {
            path,
            ttl,
            data: HashMap::new(),
            dirty: false,
        };
        cache.load();
        cache
    }

    fn load(&mut self) {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return;
        };
        match serde_json::from_str(&content) {
            Ok(data) => {
                self.data = data;
                self.sweep_expired();
            }
            Err(e) => debug!(path = %self.path.display(), error = %e, "ignoring malformed cache"),
        }
    }

    fn sweep_expired(&mut self) {
        let now = now_secs();
        let ttl = self.ttl.as_secs_f64();
        let before = self.data.len();
        self.data.retain(|_, entry| now - entry.ts < ttl);
        if self.data.len() != before {
            self.dirty = true;
        }
    }

    fn is_valid(&self, entry: &CacheEntry) -> bool {
        now_secs() - entry.ts < self.ttl.as_secs_f64()
    }

    /// The entry for an IP, if present and unexpired.
    #[must_use]
    pub fn get(&self, ip: &str) -> Option<&CacheEntry> {
        self.data.get(ip).filter(|entry| self.is_valid(entry))
    }

    /// Whether a valid entry exists for the IP.
    #[must_use]
    pub fn has(&self, ip: &str) -> bool {
        self.get(ip).is_some()
    }

    /// Cached ASN record, if any.
    #[must_use]
    pub fn get_asn(&self, ip: &str) -> Option<AsnInfo> {
        self.get(ip)?.asn_info()
    }

    /// Cached geolocation record, if any.
    #[must_use]
    pub fn get_geo(&self, ip: &str) -> Option<GeoInfo> {
        self.get(ip)?.geo_info()
    }

    /// Cached reverse-DNS hostname, if any.
    #[must_use]
    pub fn get_ptr(&self, ip: &str) -> Option<String> {
        self.get(ip)?.ptr.clone()
    }

    /// Merges enrichment data into the entry for an IP and refreshes its
    /// timestamp. Fields not provided are left untouched.
    pub fn set(
        &mut self,
        ip: &str,
        asn: Option<&AsnInfo>,
        geo: Option<&GeoInfo>,
        ptr: Option<&str>,
    ) {
        let entry = self.data.entry(ip.to_string()).or_default();
        entry.ts = now_secs();

        if let Some(asn) = asn {
            entry.asn = Some(asn.asn.clone());
            entry.org = asn.org.clone();
            entry.prefix = asn.prefix.clone();
            entry.asn_country = asn.country.clone();
        }
        if let Some(geo) = geo {
            entry.geo_country = geo.country.clone();
            entry.geo_country_code = geo.country_code.clone();
            entry.geo_city = geo.city.clone();
            entry.geo_lat = geo.lat;
            entry.geo_lon = geo.lon;
        }
        if let Some(ptr) = ptr {
            entry.ptr = Some(ptr.to_string());
        }
        self.dirty = true;
    }

    /// Writes the document if it changed. Failures are logged and ignored;
    /// the cache is not critical.
    pub fn save(&mut self) {
        if !self.dirty {
            return;
        }
        match self.write_file() {
            Ok(()) => self.dirty = false,
            Err(e) => debug!(path = %self.path.display(), error = %e, "cache save failed"),
        }
    }

    fn write_file(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        // Write-then-rename so a crashed run never truncates the document.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)
    }

    /// Drops all entries and persists the empty document.
    pub fn clear(&mut self) {
        self.data.clear();
        self.dirty = true;
        self.save();
    }
}

fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tracelens")
        .join("cache.json")
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_path() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "tracelens-cache-test-{}-{n}.json",
            std::process::id()
        ))
    }

    fn sample_asn() -> AsnInfo {
        AsnInfo {
            asn: "AS15169".into(),
            org: Some("GOOGLE, US".into()),
            prefix: Some("8.8.8.0/24".into()),
            country: Some("US".into()),
        }
    }

    #[test]
    fn set_then_get_within_ttl() {
        let mut cache = Cache::open(scratch_path(), DEFAULT_TTL);
        cache.set("8.8.8.8", Some(&sample_asn()), None, Some("dns.google"));
        assert_eq!(cache.get_asn("8.8.8.8"), Some(sample_asn()));
        assert_eq!(cache.get_ptr("8.8.8.8").as_deref(), Some("dns.google"));
        assert!(cache.has("8.8.8.8"));
    }

    #[test]
    fn expired_entry_misses() {
        let mut cache = Cache::open(scratch_path(), Duration::from_secs(60));
        cache.set("1.1.1.1", Some(&sample_asn()), None, None);
        cache.data.get_mut("1.1.1.1").unwrap().ts -= 61.0;
        assert!(cache.get("1.1.1.1").is_none());
        assert!(!cache.has("1.1.1.1"));
    }

    #[test]
    fn zero_ttl_always_misses_but_still_records() {
        let mut cache = Cache::open(scratch_path(), Duration::ZERO);
        cache.set("9.9.9.9", Some(&sample_asn()), None, None);
        assert!(!cache.has("9.9.9.9"));
        assert!(cache.get_asn("9.9.9.9").is_none());
        // The write happened even though reads miss.
        assert!(cache.data.contains_key("9.9.9.9"));
    }

    #[test]
    fn set_merges_fields() {
        let mut cache = Cache::open(scratch_path(), DEFAULT_TTL);
        cache.set("8.8.8.8", Some(&sample_asn()), None, None);
        let geo = GeoInfo {
            country: Some("United States".into()),
            country_code: Some("US".into()),
            city: Some("Mountain View".into()),
            lat: Some(37.4),
            lon: Some(-122.1),
        };
        cache.set("8.8.8.8", None, Some(&geo), None);
        cache.set("8.8.8.8", None, None, Some("dns.google"));

        assert_eq!(cache.get_asn("8.8.8.8"), Some(sample_asn()));
        assert_eq!(cache.get_geo("8.8.8.8"), Some(geo));
        assert_eq!(cache.get_ptr("8.8.8.8").as_deref(), Some("dns.google"));
    }

    #[test]
    fn geo_requires_country_field() {
        let mut cache = Cache::open(scratch_path(), DEFAULT_TTL);
        cache.set("8.8.8.8", Some(&sample_asn()), None, None);
        // ASN-only entry carries no cached geolocation.
        assert!(cache.get_geo("8.8.8.8").is_none());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let path = scratch_path();
        let mut cache = Cache::open(path.clone(), DEFAULT_TTL);
        cache.set("8.8.8.8", Some(&sample_asn()), None, Some("dns.google"));
        cache.save();

        let reloaded = Cache::open(path.clone(), DEFAULT_TTL);
        assert_eq!(reloaded.get_asn("8.8.8.8"), Some(sample_asn()));
        assert_eq!(reloaded.get_ptr("8.8.8.8").as_deref(), Some("dns.google"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_yields_empty_cache() {
        let path = scratch_path();
        fs::write(&path, "{not json").unwrap();
        let cache = Cache::open(path.clone(), DEFAULT_TTL);
        assert!(cache.data.is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_sweeps_expired_entries() {
        let path = scratch_path();
        let mut cache = Cache::open(path.clone(), Duration::from_secs(3600));
        cache.set("1.2.3.4", Some(&sample_asn()), None, None);
        cache.data.get_mut("1.2.3.4").unwrap().ts -= 7200.0;
        cache.save();

        let reloaded = Cache::open(path.clone(), Duration::from_secs(3600));
        assert!(reloaded.data.is_empty());
        let _ = fs::remove_file(path);
    }
}
