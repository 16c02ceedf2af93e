use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use gallery_core::PageRecord;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::driver::{BrowserSession, SessionFactory};
use crate::page::{PageHarvester, PageTarget};
use crate::{EngineEvent, ProgressSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_workers: usize,
    /// Wall-clock budget for harvesting one page.
    pub page_budget: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            page_budget: Duration::from_secs(600),
        }
    }
}

/// Harvests `targets` in parallel, one browser session per page.
///
/// Results keep the input order. A page whose session fails, that exceeds its
/// budget or whose worker panics yields a record carrying the error; siblings
/// are unaffected.
pub async fn harvest_pages(
    targets: Vec<PageTarget>,
    factory: Arc<dyn SessionFactory>,
    harvester: Arc<PageHarvester>,
    settings: PoolSettings,
    sink: Arc<dyn ProgressSink>,
) -> Vec<PageRecord> {
    if targets.is_empty() {
        return Vec::new();
    }
    let workers = settings.max_workers.clamp(1, targets.len());
    engine_info!(
        "Harvesting {} page(s) with {workers} worker(s)",
        targets.len()
    );
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for (index, target) in targets.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let factory = factory.clone();
        let harvester = harvester.clone();
        let sink = sink.clone();
        let budget = settings.page_budget;
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, PageRecord::failed(&target.name, &target.url, "worker pool closed"));
            };
            sink.emit(EngineEvent::PageStarted {
                index,
                url: target.url.clone(),
            });
            let record = run_worker(factory, harvester, target, budget, sink.clone()).await;
            sink.emit(EngineEvent::PageFinished {
                index,
                photos: record.total_photos(),
                error: record.error.clone(),
            });
            (index, record)
        });
    }

    let mut records: Vec<Option<PageRecord>> = vec![None; targets.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, record)) => records[index] = Some(record),
            Err(err) => engine_error!("Page worker failed to report: {err}"),
        }
    }

    records
        .into_iter()
        .zip(targets)
        .map(|(record, target)| {
            record.unwrap_or_else(|| {
                PageRecord::failed(target.name, target.url, "page worker did not report")
            })
        })
        .collect()
}

async fn run_worker(
    factory: Arc<dyn SessionFactory>,
    harvester: Arc<PageHarvester>,
    target: PageTarget,
    budget: Duration,
    sink: Arc<dyn ProgressSink>,
) -> PageRecord {
    let session: Arc<dyn BrowserSession> = match factory.open().await {
        Ok(session) => Arc::from(session),
        Err(err) => {
            engine_warn!("Could not open a browser session for {}: {err}", target.name);
            return PageRecord::failed(&target.name, &target.url, err.to_string());
        }
    };

    let task = tokio::spawn({
        let session = session.clone();
        let target = target.clone();
        async move {
            harvester
                .harvest_page(session.as_driver(), &target, sink.as_ref())
                .await
        }
    });
    let abort = task.abort_handle();

    let record = match tokio::time::timeout(budget, task).await {
        Ok(Ok(record)) => record,
        Ok(Err(err)) => {
            engine_error!("Page worker for {} panicked: {err}", target.name);
            PageRecord::failed(&target.name, &target.url, format!("worker panicked: {err}"))
        }
        Err(_) => {
            abort.abort();
            engine_warn!(
                "Page {} exceeded its {budget:?} budget, partial result discarded",
                target.name
            );
            PageRecord::failed(
                &target.name,
                &target.url,
                format!("page exceeded its {budget:?} budget"),
            )
        }
    };

    if let Err(err) = session.close().await {
        engine_warn!("Closing the session for {} failed: {err}", target.name);
    }
    record
}
