use std::fmt;
use std::path::PathBuf;

use gallery_core::Termination;

use crate::locator::ResolveError;

/// Progress notifications emitted while pages are harvested and downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PageStarted {
        index: usize,
        url: String,
    },
    WidgetHarvested {
        page: String,
        project: usize,
        found: usize,
        declared: Option<u32>,
        termination: Termination,
    },
    PageFinished {
        index: usize,
        photos: usize,
        error: Option<String>,
    },
    DownloadFinished {
        url: String,
        result: Result<PathBuf, FailureKind>,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events over a standard channel; dropped receivers are ignored.
pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Failure while observing or advancing one widget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarvestFault {
    #[error("widget could no longer be located")]
    WidgetLost,
    #[error("browser session failed: {0}")]
    Session(String),
}

impl From<ResolveError> for HarvestFault {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => HarvestFault::WidgetLost,
            ResolveError::Session(message) => HarvestFault::Session(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub final_url: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
    Persist,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => *code == 408 || *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Persist => write!(f, "could not write file"),
        }
    }
}
