//! Gallery engine: browser-facing harvest pipeline and IO.
mod details;
mod driver;
mod export;
mod extract;
mod fetch;
mod filename;
mod harvester;
mod locator;
mod navigate;
mod page;
mod persist;
mod pool;
pub mod scripts;
mod types;

#[cfg(feature = "browser")]
mod chromium;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumSession, ChromiumSessionFactory, ChromiumSettings};
pub use details::{describe, WidgetDetails};
pub use driver::{
    BrowserDriver, BrowserSession, DriverError, ElementId, Locator, ScriptArg, SessionFactory,
};
pub use export::{export_pages, ExportError, ExportOptions, ExportSummary};
pub use extract::{extract, extract_hero, observe_widget, read_progress};
pub use fetch::{
    download_all, fetch_with_retries, DownloadSummary, FetchSettings, ImageFetcher,
    ReqwestFetcher,
};
pub use filename::image_filename;
pub use harvester::{GalleryHarvester, HarvestSettings};
pub use locator::{
    default_strategies, AncestorStrategy, ClassStrategy, DomIdStrategy, LocatorResolver,
    PositionalStrategy, ResolveError, RootStrategy, WidgetHandle, WidgetIdentity,
    WidgetSelectors, DEFAULT_STALE_RETRIES,
};
pub use navigate::{advance, poll_until, Baseline, NavigationSettings};
pub use page::{PageHarvester, PageSettings, PageTarget};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pool::{harvest_pages, PoolSettings};
pub use types::{
    ChannelProgressSink, EngineEvent, FailureKind, FetchError, FetchOutput, HarvestFault,
    NullSink, ProgressSink,
};
