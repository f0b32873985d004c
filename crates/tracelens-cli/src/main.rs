//! tracelens - Enhanced traceroute with network intelligence
//!
//! Probes the path to a target over ICMP, TCP or UDP, enriches every hop
//! with ASN, geolocation and reverse-DNS data, and prints a diagnostic
//! summary. Requires elevated privileges for raw sockets.

use chrono::Local;
use clap::Parser;
use color_eyre::eyre::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracelens_diagnostics::Diagnostics;
use tracelens_enrich::{Cache, Enricher, DEFAULT_TTL};
use tracelens_probe::{TraceConfig, Tracer};
use tracelens_reports::JsonExporter;
use tracelens_types::{Protocol, RawHop, TraceReport};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod privilege;
mod render;

use app::Cli;
use render::Renderer;

/// Exit code for a user interrupt (SIGINT convention).
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let code = run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Initialize the logging/tracing system.
fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<i32> {
    let mut renderer = Renderer::new();

    if !privilege::is_elevated() {
        renderer.print_error(privilege::privilege_hint());
        return Ok(1);
    }

    let protocol = Protocol::from(cli.protocol);
    let timeout = Duration::from_secs_f64(cli.timeout);
    let port = protocol.uses_port().then_some(cli.port);

    let resolved_ip = match Tracer::resolve(&cli.target) {
        Ok(ip) => ip,
        Err(e) => {
            renderer.print_error(&e.to_string());
            return Ok(1);
        }
    };

    renderer.print_header(
        &cli.target,
        &resolved_ip.to_string(),
        protocol,
        port,
        cli.max_hops,
        cli.probes,
    );

    let cache_ttl = if cli.no_cache { Duration::ZERO } else { DEFAULT_TTL };
    let cache = Cache::open_default(cache_ttl);
    let mut enricher = Enricher::new(cache, cli.dns_enabled(), cli.geo_enabled(), timeout);

    let tracer = Tracer::new(TraceConfig {
        protocol,
        max_hops: cli.max_hops,
        probes_per_hop: cli.probes,
        timeout,
        port: cli.port,
    });

    let started = Local::now();
    let cancel = Arc::new(AtomicBool::new(false));
    let (hop_tx, mut hop_rx) = mpsc::channel::<RawHop>(1);
    let (ack_tx, ack_rx) = std::sync::mpsc::channel::<()>();

    // Probing blocks on raw-socket I/O, so it runs on the blocking pool and
    // streams hops back. The tracer waits for the ack after each hop, so
    // enrichment and cache writes complete before the next TTL is probed.
    let trace_cancel = Arc::clone(&cancel);
    let trace_task = tokio::task::spawn_blocking(move || {
        tracer.trace(resolved_ip, &trace_cancel, |hop| {
            if hop_tx.blocking_send(hop.clone()).is_ok() {
                let _ = ack_rx.recv();
            }
        })
    });

    let mut hops = Vec::new();
    let mut interrupted = false;
    loop {
        tokio::select! {
            received = hop_rx.recv() => {
                match received {
                    Some(raw) => {
                        let hop = enricher.enrich(&raw).await;
                        renderer.print_hop(&hop);
                        hops.push(hop);
                        let _ = ack_tx.send(());
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                debug!("interrupt received, stopping at next probe boundary");
                cancel.store(true, Ordering::Relaxed);
                interrupted = true;
            }
        }
    }

    let trace_result = trace_task.await?;

    if !hops.is_empty() {
        renderer.print_separator();
    }
    enricher.flush();

    if interrupted {
        println!("{}", console::style("Interrupted").yellow());
        return Ok(EXIT_INTERRUPTED);
    }

    if let Err(e) = trace_result {
        renderer.print_error(&e.to_string());
        // The euid gate can pass while socket creation is still refused,
        // e.g. under a seccomp or capability-restricted container.
        if e.is_privilege_denied() {
            eprintln!("{}", console::style(privilege::privilege_hint()).dim());
        }
        return Ok(1);
    }

    let diagnostics = Diagnostics::new();
    diagnostics.tag(&mut hops);
    let diagnosis = diagnostics.analyze(&hops);

    let report = TraceReport {
        target: cli.target.clone(),
        resolved_ip,
        protocol,
        port,
        timestamp: started,
        hops,
        reachable: diagnosis.reachable,
        total_hops: diagnosis.total_hops,
    };

    renderer.print_diagnosis(&diagnosis);

    if let Some(path) = &cli.json {
        let mut exporter = JsonExporter::new();
        exporter.add_data_source("team_cymru");
        if cli.geo_enabled() {
            exporter.add_data_source("ip-api.com");
        }
        match exporter.export(&report, &diagnosis, path) {
            Ok(()) => println!(
                "\n{} {}",
                console::style("Results exported to:").dim(),
                path.display()
            ),
            Err(e) => renderer.print_error(&format!("JSON export failed: {e}")),
        }
    }

    Ok(0)
}
