// src/cli.rs
// =============================================================================
// The command-line interface, using clap's derive API.
//
// Two subcommands:
// - scan: scan every link on one page and report the aggregate
// - check: resolve a single URL the way a scan would
//
// The scan flags map onto ScanOptions one by one (see into_options below),
// so the CLI and the library always agree on defaults.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use link_health::ScanOptions;

#[derive(Parser, Debug)]
#[command(
    name = "link-health",
    version,
    about = "Find broken, redirecting and spam links on a web page",
    long_about = "link-health collects every link on a page and classifies it as valid, \
                  broken, redirect, nofollow, skipped or spam. Redirects and errors seen \
                  while fetching are remembered, so known-bad links cost no extra requests."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan every link on a page
    ///
    /// Example: link-health scan https://example.com/blog --batch-size 10
    Scan {
        /// URL of the page to scan
        page_url: String,

        /// Read the page HTML from a file instead of fetching PAGE_URL
        ///
        /// PAGE_URL is still used to resolve relative links
        #[arg(long, value_name = "PATH")]
        html_file: Option<PathBuf>,

        #[command(flatten)]
        options: ScanArgs,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Resolve a single URL
    ///
    /// Example: link-health check http://bit.ly/abc --page https://example.com
    Check {
        /// The URL to classify
        url: String,

        /// Page the link sits on; decides internal vs external
        /// (defaults to the URL itself)
        #[arg(long, value_name = "PAGE_URL")]
        page: Option<String>,

        /// Output results in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Don't probe links to other hosts
    #[arg(long)]
    pub no_external: bool,

    /// Don't probe links to the page's own host
    #[arg(long)]
    pub no_internal: bool,

    /// Treat redirecting links as valid
    #[arg(long)]
    pub no_redirects: bool,

    /// How many links are resolved at once
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub batch_size: usize,

    /// Timeout for fetching the page, in milliseconds
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Accepted for compatibility; not used yet
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub max_retries: u32,
}

impl ScanArgs {
    pub fn into_options(self) -> ScanOptions {
        ScanOptions {
            check_external: !self.no_external,
            check_internal: !self.no_internal,
            detect_redirects: !self.no_redirects,
            max_retries: self.max_retries,
            batch_size: self.batch_size,
            timeout_ms: self.timeout_ms,
        }
    }
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does #[command(flatten)] do?
//    - It pulls the fields of ScanArgs into the scan subcommand as if they
//      were written there directly
//    - This keeps the flag list and its conversion to ScanOptions together
//
// 2. Why "--no-external" instead of "--check-external"?
//    - Every check is on by default; a bool flag in clap can only be
//      switched on, so the flag names the thing you switch off
//
// 3. Option<PathBuf>
//    - None when --html-file isn't given
//    - PathBuf is the owned version of a file path (like String for &str)
// -----------------------------------------------------------------------------
