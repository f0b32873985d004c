//! # tracelens-diagnostics
//!
//! Post-trace analysis over the enriched hop sequence.
//!
//! Detects ICMP filtering (silent hops followed by later responses),
//! latency discontinuities and likely international egress, within-hop
//! jitter and single-probe spikes, and assembles the human-readable
//! diagnosis.

#![warn(missing_docs)]
#![warn(clippy::all)]

use tracelens_types::{Diagnosis, EnrichedHop, LatencyJump};

/// RTT increase that counts as a latency jump, in milliseconds.
pub const LATENCY_JUMP_THRESHOLD: f64 = 80.0;
/// RTT increase suggesting international transit, in milliseconds.
pub const INTERNATIONAL_EGRESS_THRESHOLD: f64 = 120.0;
/// Within-hop max-min spread that counts as high jitter, in milliseconds.
pub const HIGH_JITTER_THRESHOLD: f64 = 100.0;
/// A spike must exceed this multiple of the hop mean.
pub const SPIKE_MULTIPLIER: f64 = 2.0;
/// A spike must also exceed this absolute floor, in milliseconds.
pub const SPIKE_ABSOLUTE_THRESHOLD: f64 = 300.0;

/// Analyzer over an enriched hop sequence.
///
/// Two phases: [`Diagnostics::tag`] mutates the hops with diagnostic
/// labels, [`Diagnostics::analyze`] produces the [`Diagnosis`] summary.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Threshold for tagging a latency jump (ms)
    pub latency_jump_threshold: f64,
    /// Threshold for tagging international egress (ms)
    pub egress_threshold: f64,
    /// Threshold for tagging high jitter (ms)
    pub jitter_threshold: f64,
    /// Spike multiplier over the hop mean
    pub spike_multiplier: f64,
    /// Absolute spike floor (ms)
    pub spike_absolute: f64,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            latency_jump_threshold: LATENCY_JUMP_THRESHOLD,
            egress_threshold: INTERNATIONAL_EGRESS_THRESHOLD,
            jitter_threshold: HIGH_JITTER_THRESHOLD,
            spike_multiplier: SPIKE_MULTIPLIER,
            spike_absolute: SPIKE_ABSOLUTE_THRESHOLD,
        }
    }
}

impl Diagnostics {
    /// Creates an analyzer with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies diagnostic tags to the hop sequence in place.
    pub fn tag(&self, hops: &mut [EnrichedHop]) {
        self.tag_filtering(hops);
        self.tag_latency(hops);
        self.tag_jitter(hops);

        if let Some(last) = hops.last_mut() {
            if last.reached {
                last.tag("destination");
            }
        }
    }

    /// Silent hops before the last responsive one are filtered; a silent
    /// final hop of an unreached trace is unreachable.
    fn tag_filtering(&self, hops: &mut [EnrichedHop]) {
        let last_response_idx = hops.iter().rposition(|h| h.ip.is_some());
        let len = hops.len();

        for (i, hop) in hops.iter_mut().enumerate() {
            if !(hop.all_timeout() && hop.ip.is_none()) {
                continue;
            }
            if last_response_idx.is_some_and(|last| i < last) {
                hop.tag("icmp_filtered");
            } else if i + 1 == len && !hop.reached {
                hop.tag("unreachable");
            }
        }
    }

    /// Walks mean RTTs; the previous mean only advances on hops that have
    /// one, so silent hops never contribute.
    fn tag_latency(&self, hops: &mut [EnrichedHop]) {
        let mut prev_avg: Option<f64> = None;

        for hop in hops.iter_mut() {
            let curr = hop.rtt_avg();
            if let (Some(curr), Some(prev)) = (curr, prev_avg) {
                let delta = curr - prev;
                if delta >= self.egress_threshold {
                    hop.tag("latency_jump");
                    hop.tag("international_egress");
                } else if delta >= self.latency_jump_threshold {
                    hop.tag("latency_jump");
                }
            }
            if curr.is_some() {
                prev_avg = curr;
            }
        }
    }

    fn tag_jitter(&self, hops: &mut [EnrichedHop]) {
        for hop in hops.iter_mut() {
            let valid: Vec<f64> = hop.rtts.iter().flatten().copied().collect();
            if valid.len() < 2 {
                continue;
            }
            let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
            let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            #[allow(clippy::cast_precision_loss)]
            let mean = valid.iter().sum::<f64>() / valid.len() as f64;

            if max - min > self.jitter_threshold {
                hop.tag("high_jitter");
            }
            if valid
                .iter()
                .any(|&rtt| rtt > mean * self.spike_multiplier && rtt > self.spike_absolute)
            {
                hop.tag("spike");
            }
        }
    }

    /// Produces the diagnosis summary for a (tagged or untagged) sequence.
    #[must_use]
    pub fn analyze(&self, hops: &[EnrichedHop]) -> Diagnosis {
        let mut diagnosis = Diagnosis::default();
        let Some(last) = hops.last() else {
            return diagnosis;
        };

        diagnosis.reachable = last.reached;
        diagnosis.total_hops = hops.len();
        diagnosis.avg_rtt = last.rtt_avg();

        let last_response_idx = hops.iter().rposition(|h| h.ip.is_some());
        for (i, hop) in hops.iter().enumerate() {
            if hop.all_timeout()
                && hop.ip.is_none()
                && last_response_idx.is_some_and(|last| i < last)
            {
                diagnosis.filtered_hops.push(hop.hop);
            }
        }

        let mut prev_avg: Option<f64> = None;
        for hop in hops {
            let curr = hop.rtt_avg();
            if let (Some(curr), Some(prev)) = (curr, prev_avg) {
                let delta = curr - prev;
                if delta >= self.latency_jump_threshold {
                    diagnosis.latency_jumps.push(LatencyJump {
                        hop: hop.hop,
                        delta_ms: round1(delta),
                    });
                    if delta >= self.egress_threshold && diagnosis.egress_hop.is_none() {
                        diagnosis.egress_hop = Some(hop.hop);
                    }
                }
            }
            if curr.is_some() {
                prev_avg = curr;
            }
        }

        self.summarize(&mut diagnosis);
        diagnosis
    }

    fn summarize(&self, diagnosis: &mut Diagnosis) {
        if !diagnosis.reachable {
            diagnosis.issues.push("Target unreachable".to_string());
        }

        if !diagnosis.filtered_hops.is_empty() {
            let shown = diagnosis.filtered_hops.len().min(5);
            let mut hops_str = diagnosis.filtered_hops[..shown]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            if diagnosis.filtered_hops.len() > 5 {
                hops_str.push_str(&format!(" (+{} more)", diagnosis.filtered_hops.len() - 5));
            }
            diagnosis
                .issues
                .push(format!("ICMP filtering detected at hop(s): {hops_str}"));
        }

        for jump in &diagnosis.latency_jumps {
            if jump.delta_ms >= self.egress_threshold {
                diagnosis.issues.push(format!(
                    "Latency jump +{:.1}ms at hop {} (likely international transit)",
                    jump.delta_ms, jump.hop
                ));
            } else {
                diagnosis.issues.push(format!(
                    "Latency jump +{:.1}ms at hop {}",
                    jump.delta_ms, jump.hop
                ));
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelens_types::RawHop;

    fn hop(ttl: u8, ip: Option<&str>, rtts: &[Option<f64>], reached: bool) -> EnrichedHop {
        let raw = RawHop {
            ttl,
            responder: ip.map(|s| s.parse().unwrap()),
            rtts: rtts.to_vec(),
            reached,
        };
        EnrichedHop::from_raw(&raw)
    }

    fn up(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    #[test]
    fn clean_three_hop_trace() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[1.0, 1.0, 1.0]), false),
            hop(2, Some("1.2.3.4"), &up(&[30.0, 31.0, 30.0]), false),
            hop(3, Some("8.8.8.8"), &up(&[32.0, 33.0, 32.0]), true),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert!(diagnosis.reachable);
        assert_eq!(diagnosis.total_hops, 3);
        assert!((diagnosis.avg_rtt.unwrap() - 32.33).abs() < 0.01);
        assert!(diagnosis.filtered_hops.is_empty());
        assert!(diagnosis.latency_jumps.is_empty());
        assert!(diagnosis.issues.is_empty());
        assert!(hops[2].tags.iter().any(|t| t == "destination"));
    }

    #[test]
    fn silent_middle_hop_is_filtered() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[1.0, 1.0, 1.0]), false),
            hop(2, None, &[None, None, None], false),
            hop(3, Some("8.8.8.8"), &up(&[32.0, 32.0, 32.0]), true),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert_eq!(diagnosis.filtered_hops, vec![2]);
        assert!(hops[1].tags.iter().any(|t| t == "icmp_filtered"));
        assert!(diagnosis
            .issues
            .iter()
            .any(|i| i.contains("ICMP filtering")));
    }

    #[test]
    fn unreached_trace_tags_unreachable_tail() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[1.0, 1.0, 1.0]), false),
            hop(2, None, &[None, None, None], false),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert!(!diagnosis.reachable);
        assert!(hops[1].tags.iter().any(|t| t == "unreachable"));
        assert!(!hops[1].tags.iter().any(|t| t == "icmp_filtered"));
        assert!(diagnosis.issues.iter().any(|i| i == "Target unreachable"));
    }

    #[test]
    fn international_egress_is_detected() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[1.0, 1.0, 1.0]), false),
            hop(2, Some("10.0.0.2"), &up(&[2.0, 2.0, 2.0]), false),
            hop(3, Some("1.2.3.4"), &up(&[150.0, 151.0, 152.0]), false),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert_eq!(diagnosis.latency_jumps.len(), 1);
        let jump = diagnosis.latency_jumps[0];
        assert_eq!(jump.hop, 3);
        assert!((jump.delta_ms - 149.0).abs() < 0.5);
        assert_eq!(diagnosis.egress_hop, Some(3));
        assert!(hops[2].tags.iter().any(|t| t == "international_egress"));
        assert!(hops[2].tags.iter().any(|t| t == "latency_jump"));
        assert!(diagnosis
            .issues
            .iter()
            .any(|i| i.contains("international transit")));
    }

    #[test]
    fn jitter_and_spike_are_tagged() {
        let mut hops = vec![hop(1, Some("1.2.3.4"), &up(&[20.0, 25.0, 400.0]), true)];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);

        assert!(hops[0].tags.iter().any(|t| t == "high_jitter"));
        assert!(hops[0].tags.iter().any(|t| t == "spike"));
    }

    #[test]
    fn moderate_jump_without_egress() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[5.0, 5.0, 5.0]), false),
            hop(2, Some("10.0.0.2"), &up(&[95.0, 95.0, 95.0]), true),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert_eq!(diagnosis.latency_jumps.len(), 1);
        assert_eq!(diagnosis.egress_hop, None);
        assert!(hops[1].tags.iter().any(|t| t == "latency_jump"));
        assert!(!hops[1].tags.iter().any(|t| t == "international_egress"));
    }

    #[test]
    fn silent_hop_does_not_feed_latency_deltas() {
        let mut hops = vec![
            hop(1, Some("10.0.0.1"), &up(&[10.0, 10.0, 10.0]), false),
            hop(2, None, &[None, None, None], false),
            hop(3, Some("8.8.8.8"), &up(&[50.0, 50.0, 50.0]), true),
        ];
        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        // 50 - 10 = 40ms, below the jump threshold; the silent hop is
        // skipped rather than treated as zero.
        assert!(diagnosis.latency_jumps.is_empty());
    }

    #[test]
    fn filtered_hop_elision_past_five() {
        let mut hops: Vec<EnrichedHop> = (1..=8)
            .map(|ttl| hop(ttl, None, &[None, None, None], false))
            .collect();
        hops.push(hop(9, Some("8.8.8.8"), &up(&[30.0, 30.0, 30.0]), true));

        let diagnostics = Diagnostics::new();
        diagnostics.tag(&mut hops);
        let diagnosis = diagnostics.analyze(&hops);

        assert_eq!(diagnosis.filtered_hops.len(), 8);
        let issue = diagnosis
            .issues
            .iter()
            .find(|i| i.contains("ICMP filtering"))
            .unwrap();
        assert!(issue.contains("(+3 more)"));
    }

    #[test]
    fn empty_trace_yields_default_diagnosis() {
        let diagnostics = Diagnostics::new();
        let diagnosis = diagnostics.analyze(&[]);
        assert!(!diagnosis.reachable);
        assert_eq!(diagnosis.total_hops, 0);
        assert!(diagnosis.issues.is_empty());
    }
}
