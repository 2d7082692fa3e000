//! Progress reporting for the crawler
//!
//! Provides a live spinner using indicatif and the styled header and
//! summary printed around a crawl.

use crate::walker::{CrawlProgress, CrawlResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays crawl status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &CrawlProgress) {
        let msg = format!(
            "{} | Dirs: {} | Files: {} | Rate: {:.0}/s | Queue: {} | In flight: {}",
            progress.phase.label(),
            format_number(progress.dirs),
            format_number(progress.files),
            progress.rate(),
            format_number(progress.queue_size as u64),
            format_number(progress.outstanding),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn per_second(count: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Print a summary of the crawl results
pub fn print_summary(result: &CrawlResult) {
    println!();
    println!("{}", style("Crawl Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} in {:.1}s",
        style("Directories:").bold(),
        format_number(result.dirs_discovered),
        result.discovery_duration.as_secs_f64()
    );
    println!(
        "  {} {} in {:.1}s ({:.0} files/sec)",
        style("Files:").bold(),
        format_number(result.files_emitted),
        result.listing_duration.as_secs_f64(),
        per_second(result.files_emitted, result.listing_duration)
    );
    if result.list_errors > 0 || result.entry_errors > 0 {
        println!(
            "  {} {} directories, {} entries unreadable",
            style("Skipped:").yellow().bold(),
            format_number(result.list_errors),
            format_number(result.entry_errors)
        );
    }
    if result.symlink_loops > 0 {
        println!(
            "  {} {}",
            style("Symlink loops:").yellow().bold(),
            format_number(result.symlink_loops)
        );
    }
    println!("  {} {}", style("Ledger:").bold(), result.ledger_path.display());

    if let [single] = result.shards.as_slice() {
        println!(
            "  {} {} ({})",
            style("Manifest:").bold(),
            single.path.display(),
            format_size(single.bytes, BINARY)
        );
    } else {
        let max = result.shards.iter().map(|s| s.records).max().unwrap_or(0);
        let min = result.shards.iter().map(|s| s.records).min().unwrap_or(0);
        println!(
            "  {} {} files, {} total (min {} / max {} records)",
            style("Shards:").bold(),
            result.shards.len(),
            format_size(result.output_bytes(), BINARY),
            format_number(min),
            format_number(max)
        );
    }
    println!(
        "  {} {:.1}s",
        style("Duration:").bold(),
        result.duration().as_secs_f64()
    );
    println!();
}

/// Print a header at the start of the crawl
pub fn print_header(root: &str, workers1: usize, workers2: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("manifest-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {} / {}", style("Workers:").bold(), workers1, workers2);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}
