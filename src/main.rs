use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use notion_tidy::core::{find_page_files, run_bundle, TidyOptions};

/// Tidy up an extracted Notion HTML export bundle
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the extracted export bundle
    bundle: PathBuf,

    /// Number of parallel workers (default: all available processing units)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Network timeout in seconds (0 disables the timeout)
    #[arg(short, long, default_value_t = 60)]
    timeout: u64,

    /// Custom User-Agent header for asset downloads
    #[arg(short = 'u', long)]
    user_agent: Option<String>,

    /// Re-download the math stylesheet on every qualifying page instead of
    /// deduplicating the download across the run
    #[arg(long)]
    legacy_stylesheet_fetch: bool,

    /// Suppress the progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if !cli.bundle.is_dir() {
        anyhow::bail!("{} is not a directory", cli.bundle.display());
    }

    let options = TidyOptions {
        jobs: cli.jobs,
        timeout: cli.timeout,
        user_agent: cli.user_agent.clone(),
        legacy_stylesheet_fetch: cli.legacy_stylesheet_fetch,
    };

    let total = find_page_files(&cli.bundle)
        .with_context(|| format!("failed to scan {}", cli.bundle.display()))?
        .len();

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total as u64)
    };
    progress.set_style(ProgressStyle::with_template(
        "{bar:40} {pos}/{len} {msg}",
    )?);

    let summary = run_bundle(&cli.bundle, &options, |page, result| {
        match result {
            Ok(report) => progress.set_message(format!(
                "{} (images: {}, equations: {})",
                report.filename, report.images, report.equations
            )),
            Err(_) => progress.set_message(format!("failed: {}", page.display())),
        }
        progress.inc(1);
    })
    .context("tidy run failed")?;
    progress.finish_and_clear();

    for (page, error) in &summary.failures {
        eprintln!("error: {}: {error}", page.display());
    }
    println!(
        "Processed {} of {} pages",
        summary.reports.len(),
        total
    );
    println!("Time elapsed: {:.2}s", summary.elapsed.as_secs_f64());

    if !summary.failures.is_empty() {
        process::exit(1);
    }
    Ok(())
}
