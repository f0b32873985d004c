//! # tracelens-reports
//!
//! JSON report export. The document is designed to be both human-readable
//! and machine-parseable: ISO 8601 timestamps, RTTs rounded to two
//! decimals, latency-jump deltas to one.

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::Local;
use serde_json::{json, Value};
use std::fs;
use std::io;
use std::path::Path;
use tracelens_types::{Diagnosis, EnrichedHop, GeoInfo, Result, TraceReport};

/// Builds and writes the JSON report document.
pub struct JsonExporter {
    data_sources: Vec<String>,
}

impl JsonExporter {
    /// Creates an exporter with no recorded data sources.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_sources: Vec::new(),
        }
    }

    /// Records a data source used during enrichment.
    pub fn add_data_source(&mut self, source: &str) {
        if !self.data_sources.iter().any(|s| s == source) {
            self.data_sources.push(source.to_string());
        }
    }

    /// Assembles the report document.
    #[must_use]
    pub fn build(&self, report: &TraceReport, diagnosis: &Diagnosis) -> Value {
        let data_sources = if self.data_sources.is_empty() {
            vec!["team_cymru".to_string(), "ip-api.com".to_string()]
        } else {
            self.data_sources.clone()
        };

        json!({
            "meta": {
                "version": env!("CARGO_PKG_VERSION"),
                "generator": "TraceLens",
                "data_sources": data_sources,
                "generated_at": Local::now().to_rfc3339(),
            },
            "target": report.target,
            "resolved_ip": report.resolved_ip.to_string(),
            "protocol": report.protocol.to_string(),
            "port": report.port,
            "timestamp": report.timestamp.to_rfc3339(),
            "hops": report.hops.iter().map(hop_value).collect::<Vec<_>>(),
            "diagnosis": {
                "reachable": diagnosis.reachable,
                "total_hops": diagnosis.total_hops,
                "avg_rtt_ms": diagnosis.avg_rtt.map(round2),
                "filtered_hops": diagnosis.filtered_hops,
                "latency_jumps": diagnosis.latency_jumps.iter().map(|jump| {
                    json!({ "hop": jump.hop, "delta_ms": round1(jump.delta_ms) })
                }).collect::<Vec<_>>(),
                "egress_hop": diagnosis.egress_hop,
                "summary": diagnosis.issues,
            },
        })
    }

    /// Assembles the document and writes it pretty-printed, creating parent
    /// directories as needed.
    pub fn export(&self, report: &TraceReport, diagnosis: &Diagnosis, path: &Path) -> Result<()> {
        let data = self.build(report, diagnosis);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn hop_value(hop: &EnrichedHop) -> Value {
    json!({
        "hop": hop.hop,
        "ip": hop.ip.map(|ip| ip.to_string()),
        "probes": hop.rtts.iter().map(|rtt| rtt.map(round2)).collect::<Vec<_>>(),
        "rtt_min": hop.rtt_min().map(round2),
        "rtt_avg": hop.rtt_avg().map(round2),
        "rtt_max": hop.rtt_max().map(round2),
        "ptr": hop.ptr,
        "asn": hop.asn,
        "org": hop.org,
        "geo": hop.geo.as_ref().map(geo_value),
        "ip_type": hop.ip_class.map(|class| class.to_string()),
        "tags": hop.tags,
    })
}

fn geo_value(geo: &GeoInfo) -> Value {
    json!({
        "country": geo.country,
        "country_code": geo.country_code,
        "city": geo.city,
        "lat": geo.lat,
        "lon": geo.lon,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
