//! Console rendering: header, real-time hop rows, diagnosis summary.
//!
//! Per-hop rows stream as the trace progresses, carrying only the in-flight
//! tags (IP classification, coarse status); diagnostic tags land in the
//! summary after the post-pass.

use console::style;
use tracelens_enrich::flag;
use tracelens_types::{Diagnosis, EnrichedHop, GeoInfo, Protocol};

const TABLE_WIDTH: usize = 100;

/// Streaming console renderer for trace output.
pub struct Renderer {
    table_header_printed: bool,
}

impl Renderer {
    /// Creates a renderer with no output emitted yet.
    pub fn new() -> Self {
        Self {
            table_header_printed: false,
        }
    }

    /// Prints the trace header.
    pub fn print_header(
        &self,
        target: &str,
        resolved_ip: &str,
        protocol: Protocol,
        port: Option<u16>,
        max_hops: u8,
        probes: u8,
    ) {
        let mut protocol_info = protocol.to_string().to_uppercase();
        if let Some(port) = port {
            protocol_info.push_str(&format!(":{port}"));
        }

        println!(
            "{} {}",
            style("TraceLens").cyan().bold(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        );
        if target == resolved_ip {
            println!("{} {}", style("Target:").dim(), style(target).bold());
        } else {
            println!(
                "{} {} {}",
                style("Target:").dim(),
                style(target).bold(),
                style(format!("({resolved_ip})")).dim()
            );
        }
        println!(
            "{}",
            style(format!(
                "Protocol: {protocol_info}  |  Probes: {probes} x {max_hops} hops"
            ))
            .dim()
        );
        println!();
    }

    fn print_table_header(&mut self) {
        if self.table_header_printed {
            return;
        }
        self.table_header_printed = true;

        println!("{}", "─".repeat(TABLE_WIDTH));
        let header = format!(
            "{:>3}  {:^16}  {:<16}  {:<6}  {:<8}  {:<14}  {}",
            "#", "RTT (ms)", "IP", "Status", "ASN", "Location", "Organization"
        );
        println!("{}", style(header).magenta().bold());
        println!("{}", "─".repeat(TABLE_WIDTH));
    }

    /// Prints one enriched hop as a table row, emitting the table header
    /// before the first row.
    pub fn print_hop(&mut self, hop: &EnrichedHop) {
        self.print_table_header();

        let ip = hop
            .ip
            .map_or_else(|| "*".to_string(), |ip| ip.to_string());
        let row = format!(
            "{:>3}  {:^16}  {:<16}  {:<6}  {:<8}  {:<14}  {}",
            hop.hop,
            format_rtt(&hop.rtts),
            ip,
            format_tags(&hop.tags),
            hop.asn.as_deref().unwrap_or("-"),
            format_geo(hop.geo.as_ref()),
            format_org(hop.org.as_deref()),
        );
        if hop.all_timeout() {
            println!("{}", style(row).yellow());
        } else {
            println!("{row}");
        }
    }

    /// Prints the table separator.
    pub fn print_separator(&self) {
        println!("{}", "─".repeat(TABLE_WIDTH));
    }

    /// Prints the diagnostic summary block.
    pub fn print_diagnosis(&self, diagnosis: &Diagnosis) {
        println!();
        println!("{}", style("Summary").bold());

        if diagnosis.reachable {
            let rtt = diagnosis
                .avg_rtt
                .map(|ms| format!(", {ms:.0}ms avg"))
                .unwrap_or_default();
            println!(
                "  {} {} {}",
                style("✅").green(),
                style("Target reachable:").bold(),
                style(format!("{} hops{rtt}", diagnosis.total_hops)).dim()
            );
        } else {
            println!(
                "  {} {}",
                style("❌").red(),
                style("Target unreachable").red().bold()
            );
        }

        if !diagnosis.filtered_hops.is_empty() {
            let shown = diagnosis.filtered_hops.len().min(5);
            let mut hops_str = diagnosis.filtered_hops[..shown]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if diagnosis.filtered_hops.len() > 5 {
                hops_str.push_str(&format!(" (+{})", diagnosis.filtered_hops.len() - 5));
            }
            println!(
                "  {} {} {}",
                style("⚠️").yellow(),
                style("ICMP filtering:").bold(),
                style(format!("hops {hops_str}")).dim()
            );
        }

        for jump in &diagnosis.latency_jumps {
            if jump.delta_ms >= tracelens_diagnostics::INTERNATIONAL_EGRESS_THRESHOLD {
                println!(
                    "  {} {} {} {}",
                    style("🌐").magenta(),
                    style("Egress:").bold(),
                    style(format!("+{:.0}ms at hop {}", jump.delta_ms, jump.hop)).dim(),
                    style("(international transit)").dim().italic()
                );
            } else {
                println!(
                    "  {} {} {}",
                    style("🚀").cyan(),
                    style("Latency jump:").bold(),
                    style(format!("+{:.0}ms at hop {}", jump.delta_ms, jump.hop)).dim()
                );
            }
        }
    }

    /// Prints an error message to stderr.
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {message}", style("Error:").red().bold());
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// "min / avg / max" when all probes answered, per-probe values with `*`
/// placeholders otherwise.
fn format_rtt(rtts: &[Option<f64>]) -> String {
    let valid: Vec<f64> = rtts.iter().flatten().copied().collect();
    if valid.is_empty() {
        return "* / * / *".to_string();
    }
    if valid.len() == rtts.len() {
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg = valid.iter().sum::<f64>() / valid.len() as f64;
        return format!("{min:.0} / {avg:.0} / {max:.0}");
    }
    rtts.iter()
        .map(|rtt| rtt.map_or_else(|| "*".to_string(), |ms| format!("{ms:.0}")))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn format_geo(geo: Option<&GeoInfo>) -> String {
    let Some(geo) = geo else {
        return "-".to_string();
    };
    let mut parts = Vec::new();
    if let Some(code) = geo.country_code.as_deref() {
        let flag = flag(code);
        if !flag.is_empty() {
            parts.push(flag.to_string());
        }
    }
    let place = geo
        .city
        .as_deref()
        .or(geo.country.as_deref())
        .or(geo.country_code.as_deref());
    if let Some(place) = place {
        parts.push(truncate(place, 12));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(" ")
    }
}

/// Trims the registration-country suffix and keeps the leading name part.
fn format_org(org: Option<&str>) -> String {
    let Some(org) = org else {
        return "-".to_string();
    };
    let mut org = org.trim();
    for suffix in [
        ", CN", ", US", ", JP", ", HK", ", SG", ", DE", ", GB", ", NL", ", TW", ", KR",
    ] {
        if let Some(stripped) = org.strip_suffix(suffix) {
            org = stripped;
            break;
        }
    }
    org.split(',').next().unwrap_or(org).trim().to_string()
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .take(2)
        .map(|tag| tag_icon(tag))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tag_icon(tag: &str) -> &'static str {
    match tag {
        "private" => "🏠",
        "cgnat" => "🔒",
        "loopback" => "🔄",
        "linklocal" => "🔗",
        "icmp_filtered" => "⚠️",
        "unreachable" => "❌",
        "latency_jump" => "🚀",
        "international_egress" => "🌐",
        "high_jitter" => "📈",
        "spike" => "⚡",
        "destination" => "✅",
        _ => "•",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtt_formats_cover_all_cases() {
        assert_eq!(format_rtt(&[None, None, None]), "* / * / *");
        assert_eq!(format_rtt(&[Some(10.0), Some(20.0), Some(30.0)]), "10 / 20 / 30");
        assert_eq!(format_rtt(&[Some(10.4), None, Some(30.0)]), "10 / * / 30");
    }

    #[test]
    fn org_strips_country_suffix() {
        assert_eq!(format_org(Some("GOOGLE, US")), "GOOGLE");
        assert_eq!(format_org(Some("CHINANET-BACKBONE No.31, CN")), "CHINANET-BACKBONE No.31");
        assert_eq!(format_org(None), "-");
    }

    #[test]
    fn geo_prefers_city_over_country() {
        let geo = GeoInfo {
            country: Some("Japan".into()),
            country_code: Some("JP".into()),
            city: Some("Tokyo".into()),
            lat: None,
            lon: None,
        };
        let rendered = format_geo(Some(&geo));
        assert!(rendered.contains("Tokyo"));
        assert!(!rendered.contains("Japan"));
    }

    #[test]
    fn geo_falls_back_to_country_code() {
        let geo = GeoInfo::from_country_code("US");
        let rendered = format_geo(Some(&geo));
        assert!(rendered.contains("US") || rendered.contains("🇺🇸"));
        assert_eq!(format_geo(None), "-");
    }

    #[test]
    fn tags_render_at_most_two_icons() {
        let tags: Vec<String> = vec!["latency_jump".into(), "international_egress".into(), "spike".into()];
        let rendered = format_tags(&tags);
        assert_eq!(rendered, "🚀 🌐");
    }
}
