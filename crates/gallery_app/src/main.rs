mod config;
mod logging;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use gallery_core::{fetch_plan, FetchTarget};
use gallery_engine::{
    download_all, ensure_output_dir, export_pages, harvest_pages, AtomicFileWriter,
    ChromiumSessionFactory, ExportOptions, GalleryHarvester, LocatorResolver, PageHarvester,
    ProgressSink, ReqwestFetcher, SessionFactory,
};
use log::LevelFilter;

use crate::config::AppConfig;
use crate::progress::LogProgressSink;

/// Harvests every image behind the carousel galleries of the configured pages.
#[derive(Debug, Parser)]
#[command(name = "gallery-harvest", version)]
struct Cli {
    /// RON file listing the pages to harvest.
    #[arg(short, long, default_value = "gallery.ron")]
    config: PathBuf,
    /// Output directory; overrides the configured one.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Download every harvested image after the records are written.
    #[arg(long)]
    download: bool,
    /// Show the browser window.
    #[arg(long)]
    headed: bool,
    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long)]
    max_workers: Option<usize>,
    /// Log per-step progress.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(level, cli.log_file.as_deref());

    let config = config::load(&cli.config)?;
    run(&cli, config).await
}

async fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    let output_dir = cli.output.clone().unwrap_or_else(|| config.output_dir.clone());
    ensure_output_dir(&output_dir)
        .with_context(|| format!("cannot use output directory {}", output_dir.display()))?;

    let factory: Arc<dyn SessionFactory> = Arc::new(ChromiumSessionFactory::new(
        config.browser.chromium_settings(cli.headed),
    ));
    let harvester = GalleryHarvester::new(
        LocatorResolver::new(config.selectors.clone()),
        config.policy.clone(),
        config.timing.harvest_settings(),
    );
    let page_harvester = Arc::new(PageHarvester::new(harvester, config.timing.page_settings()));
    let sink: Arc<dyn ProgressSink> = Arc::new(LogProgressSink::new(config.pages.len()));
    let max_workers = cli.max_workers.unwrap_or(config.max_workers);

    let started = Instant::now();
    let pages = harvest_pages(
        config.pages.clone(),
        factory,
        page_harvester,
        config.timing.pool_settings(max_workers),
        sink.clone(),
    )
    .await;

    let export = export_pages(&output_dir, &pages, &ExportOptions::default())
        .context("failed to write harvest records")?;
    engine_info!(
        "Harvested {} image(s) from {} page(s) in {:.1?}; summary at {}",
        export.total_photos,
        pages.len(),
        started.elapsed(),
        export.summary_path.display()
    );

    if cli.download || config.download {
        let settings = config.timing.fetch_settings();
        let fetcher = ReqwestFetcher::new(settings.clone())?;
        let writer = AtomicFileWriter::new(output_dir.join("images"));
        let targets: Vec<FetchTarget> = pages.iter().flat_map(fetch_plan).collect();
        let summary = download_all(&fetcher, targets, &writer, &settings, sink.as_ref()).await;
        if !summary.failed.is_empty() {
            engine_warn!(
                "{} image(s) could not be downloaded into {}",
                summary.failed.len(),
                writer.dir().display()
            );
        }
    }

    let failed = pages.iter().filter(|page| page.error.is_some()).count();
    if failed > 0 && failed == pages.len() {
        bail!("every page failed to harvest");
    }
    if failed > 0 {
        engine_warn!("{failed} of {} page(s) failed", pages.len());
    }
    Ok(())
}
