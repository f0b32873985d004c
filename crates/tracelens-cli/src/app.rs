//! CLI application definition using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracelens_types::Protocol;

/// tracelens - Enhanced traceroute with network intelligence
#[derive(Parser, Debug)]
#[command(
    name = "tracelens",
    author,
    version,
    about = "Enhanced traceroute with network intelligence",
    long_about = "Trace the route to a target (IP address or hostname) with automatic\n\
                  enrichment of ASN, organization, geographic and reverse-DNS data,\n\
                  followed by a diagnostic summary.\n\n\
                  Examples:\n\n    \
                  tracelens 8.8.8.8\n    \
                  tracelens google.com -p tcp --port 443\n    \
                  tracelens 1.1.1.1 --json output.json"
)]
pub struct Cli {
    /// Target host or IP address
    pub target: String,

    /// Probe protocol
    #[arg(short, long, value_enum, default_value = "icmp")]
    pub protocol: ProtocolArg,

    /// Port for TCP/UDP probes
    #[arg(long, default_value = "80")]
    pub port: u16,

    /// Maximum number of hops
    #[arg(short, long, default_value = "30")]
    pub max_hops: u8,

    /// Number of probes per hop
    #[arg(short = 'q', long = "probes", default_value = "3")]
    pub probes: u8,

    /// Timeout per probe in seconds
    #[arg(short = 'w', long, default_value = "2.0")]
    pub timeout: f64,

    /// Enable PTR lookups (default)
    #[arg(long, overrides_with = "no_dns")]
    pub dns: bool,

    /// Disable PTR lookups
    #[arg(long, overrides_with = "dns")]
    pub no_dns: bool,

    /// Enable geo lookups (default)
    #[arg(long, overrides_with = "no_geo")]
    pub geo: bool,

    /// Disable geo lookups
    #[arg(long, overrides_with = "geo")]
    pub no_geo: bool,

    /// Export results to JSON file
    #[arg(long = "json", value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Disable cache (always fetch fresh data)
    #[arg(long)]
    pub no_cache: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(long)]
    pub quiet: bool,
}

impl Cli {
    /// Whether PTR lookups are enabled.
    pub fn dns_enabled(&self) -> bool {
        !self.no_dns
    }

    /// Whether geo lookups are enabled.
    pub fn geo_enabled(&self) -> bool {
        !self.no_geo
    }
}

/// Probe protocol options
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ProtocolArg {
    /// ICMP Echo
    #[default]
    Icmp,
    /// TCP SYN
    Tcp,
    /// UDP to high ports
    Udp,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Icmp => Self::Icmp,
            ProtocolArg::Tcp => Self::Tcp,
            ProtocolArg::Udp => Self::Udp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["tracelens", "8.8.8.8"]);
        assert_eq!(cli.target, "8.8.8.8");
        assert_eq!(cli.port, 80);
        assert_eq!(cli.max_hops, 30);
        assert_eq!(cli.probes, 3);
        assert!((cli.timeout - 2.0).abs() < f64::EPSILON);
        assert!(cli.dns_enabled());
        assert!(cli.geo_enabled());
        assert!(!cli.no_cache);
    }

    #[test]
    fn negating_flags_disable_lookups() {
        let cli = Cli::parse_from(["tracelens", "8.8.8.8", "--no-dns", "--no-geo"]);
        assert!(!cli.dns_enabled());
        assert!(!cli.geo_enabled());
    }

    #[test]
    fn later_flag_wins_for_negatable_pairs() {
        let cli = Cli::parse_from(["tracelens", "8.8.8.8", "--no-dns", "--dns"]);
        assert!(cli.dns_enabled());
    }

    #[test]
    fn protocol_and_port_parse() {
        let cli = Cli::parse_from(["tracelens", "example.com", "-p", "tcp", "--port", "443"]);
        assert_eq!(Protocol::from(cli.protocol), Protocol::Tcp);
        assert_eq!(cli.port, 443);
    }
}
