use std::sync::atomic::{AtomicUsize, Ordering};

use engine_logging::{engine_info, engine_warn};
use gallery_engine::{EngineEvent, ProgressSink};

/// Reports engine progress through the log.
pub struct LogProgressSink {
    pages: usize,
    finished: AtomicUsize,
}

impl LogProgressSink {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            finished: AtomicUsize::new(0),
        }
    }
}

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::PageStarted { index, url } => {
                engine_info!("[{}/{}] Opening {url}", index + 1, self.pages);
            }
            EngineEvent::WidgetHarvested {
                page,
                project,
                found,
                declared: Some(declared),
                termination,
            } => {
                engine_info!("{page} project {project}: {found}/{declared} image(s), {termination}");
            }
            EngineEvent::WidgetHarvested {
                page,
                project,
                found,
                declared: None,
                termination,
            } => {
                engine_info!("{page} project {project}: {found} image(s), {termination}");
            }
            EngineEvent::PageFinished {
                index,
                photos,
                error,
            } => {
                let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
                match error {
                    Some(error) => engine_warn!(
                        "Page {} failed after {photos} image(s): {error} ({done}/{} done)",
                        index + 1,
                        self.pages
                    ),
                    None => engine_info!(
                        "Page {} finished with {photos} image(s) ({done}/{} done)",
                        index + 1,
                        self.pages
                    ),
                }
            }
            EngineEvent::DownloadFinished { url, result } => {
                if let Err(kind) = result {
                    engine_warn!("Download of {url} failed: {kind}");
                }
            }
        }
    }
}
