// src/main.rs
// =============================================================================
// Entry point of the link-health CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Start the observation store and the probe channels
// 3. Dispatch to the subcommand handler
// 4. Print the results and exit with the proper code
//    (0 = clean, 1 = broken links found, 2 = error)
//
// All the real work lives in the library (src/lib.rs); this file only wires
// the pieces together for one run.
// =============================================================================

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use cli::{Cli, Commands, ScanArgs};
use link_health::observe::{monitored_client, ObservationStore, StoreHandle};
use link_health::resolve::{ProbeChannels, Resolution, Resolver};
use link_health::scan::{LinkRecord, LinkStatus, Page, ScanEvent, ScanOrchestrator, ScanResult, ScanState};
use link_health::{ResolverConfig, ScanOptions};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init_logging()?;

    match cli.command {
        Commands::Scan {
            page_url,
            html_file,
            options,
            json,
        } => handle_scan(&page_url, html_file, options, json).await,
        Commands::Check { url, page, json } => handle_check(&url, page.as_deref(), json).await,
    }
}

// Handles the 'scan' subcommand
async fn handle_scan(
    page_url: &str,
    html_file: Option<std::path::PathBuf>,
    args: ScanArgs,
    json: bool,
) -> Result<i32> {
    let options = args.into_options();
    let store = StoreHandle::spawn(ObservationStore::new());

    // Read the file before anything starts; a missing file is a usage error
    let inline = match html_file {
        Some(path) => {
            let html = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            Some(Page::from_html(page_url, html)?)
        }
        None => None,
    };

    let client = monitored_client(store.clone(), options.timeout())?;
    let probes = ProbeChannels::connect(&store, &ResolverConfig::default())
        .context("starting probe channels")?;
    let orchestrator = ScanOrchestrator::new(store, probes);

    // Progress goes to the log; the final result is printed below
    let mut events = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ScanEvent::Progress { progress, .. } => info!("progress {}%", progress),
                ScanEvent::Finished(_) => break,
            }
        }
    });

    // A page that can't be fetched comes back as a Failed result (exit 2)
    let result = match &inline {
        Some(page) => orchestrator.scan_links(page, options).await,
        None => orchestrator.fetch_and_scan(&client, page_url, options).await,
    };
    if let Err(e) = progress.await {
        debug!(error = %e, "progress listener stopped");
    }

    print_results(&result, json)?;

    Ok(exit_code(&result))
}

// Handles the 'check' subcommand
async fn handle_check(url: &str, page: Option<&str>, json: bool) -> Result<i32> {
    let page_url = page.unwrap_or(url);
    let page = Url::parse(page_url).with_context(|| format!("invalid page URL {}", page_url))?;

    let store = StoreHandle::spawn(ObservationStore::new());
    let probes = ProbeChannels::connect(&store, &ResolverConfig::default())
        .context("starting probe channels")?;
    let resolver = Resolver::new(store.clone(), probes);

    let resolution = resolver.resolve(url, &page, &ScanOptions::default()).await;
    let known = store.check_redirect(url).await?;

    if json {
        let output = json!({
            "url": url,
            "resolution": resolution,
            "observed": known,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_resolution(url, &resolution);
        if known.is_redirect {
            println!(
                "   observed redirect -> {}",
                known.redirect_url.as_deref().unwrap_or("?")
            );
        }
    }

    Ok(if resolution.is_broken { 1 } else { 0 })
}

fn exit_code(result: &ScanResult) -> i32 {
    match result.state {
        ScanState::Failed => 2,
        _ if result.has_broken_links => 1,
        _ => 0,
    }
}

// Prints the results either as a table or JSON
fn print_results(result: &ScanResult, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(result)?;
        println!("{}", json_output);
    } else {
        print_table(result);
    }
    Ok(())
}

// Prints results as a human-readable table in the terminal
fn print_table(result: &ScanResult) {
    println!("🔍 {}", result.page_url);
    println!();
    println!("{:<60} {:<14} {:<8} {:<30}", "URL", "STATUS", "CODE", "NOTE");
    println!("{}", "=".repeat(112));

    for link in &result.links {
        let code = link
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_default();
        println!(
            "{:<60} {:<14} {:<8} {:<30}",
            truncate(&link.url, 57),
            format_status(link),
            code,
            describe(link)
        );
    }

    println!();

    if let Some(message) = &result.error_message {
        println!("⚠️  Scan failed: {}", message);
    }
    for warning in &result.warnings {
        println!("⚠️  {}", warning);
    }

    println!("📊 Summary:");
    println!("   ✅ Valid: {}", result.counts.valid);
    println!("   ❌ Broken: {}", result.counts.broken);
    println!("   🔀 Redirect: {}", result.counts.redirect);
    println!("   🚫 Nofollow: {}", result.counts.nofollow);
    println!("   ⏭️  Skipped: {}", result.counts.skipped);
    println!("   🗑️  Spam: {}", result.counts.spam);
    println!("   📋 Total: {}", result.total);
    if let Some(ms) = result.duration_ms {
        println!("   ⏱️  {} ms", ms);
    }
}

fn print_resolution(url: &str, resolution: &Resolution) {
    let status = if resolution.is_broken {
        "❌ BROKEN"
    } else if resolution.is_redirect {
        "🔀 REDIRECT"
    } else {
        "✅ VALID"
    };
    let code = resolution
        .status_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("{}  {}  ({}, via {:?})", url, status, code, resolution.source);
    if let Some(target) = &resolution.redirect_url {
        println!("   -> {}", target);
    }
    if let Some(source) = &resolution.redirect_source {
        println!("   redirect destination of {}", source);
    }
    if resolution.inconclusive {
        println!("   (no definitive answer)");
    }
}

fn format_status(link: &LinkRecord) -> &'static str {
    match link.status {
        LinkStatus::Valid if link.rel.nofollow => "🚫 NOFOLLOW",
        LinkStatus::Valid => "✅ VALID",
        LinkStatus::Broken => "❌ BROKEN",
        LinkStatus::Redirect => "🔀 REDIRECT",
        LinkStatus::Skipped => "⏭️  SKIPPED",
        LinkStatus::Spam => "🗑️  SPAM",
        LinkStatus::Unknown => "❔ UNKNOWN",
    }
}

fn describe(link: &LinkRecord) -> String {
    match (&link.redirect_target, &link.note) {
        (Some(target), _) => format!("-> {}", target),
        (None, Some(note)) => note.clone(),
        (None, None) => String::new(),
    }
}

// Cuts on a char boundary so multi-byte URLs don't panic
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
