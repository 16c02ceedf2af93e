use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, StreamExt};
use gallery_core::FetchTarget;
use reqwest::header::CONTENT_TYPE;

use crate::filename::image_filename;
use crate::persist::AtomicFileWriter;
use crate::{EngineEvent, FailureKind, FetchError, FetchOutput, ProgressSink};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
    /// Accepted `Content-Type` prefixes. A missing header is accepted.
    pub allowed_content_types: Vec<String>,
    pub max_attempts: u32,
    /// Delay before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 50 * 1024 * 1024,
            allowed_content_types: vec![
                "image/".to_string(),
                "application/octet-stream".to_string(),
            ],
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
            concurrency: 4,
        }
    }
}

#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings.allowed_content_types.iter().any(|allowed| {
            ct.get(..allowed.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(allowed))
        })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchOutput {
            bytes,
            final_url,
            content_type,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

/// Fetches `url`, retrying transient failures with linear backoff.
pub async fn fetch_with_retries(
    fetcher: &dyn ImageFetcher,
    url: &str,
    settings: &FetchSettings,
) -> Result<FetchOutput, FetchError> {
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match fetcher.fetch(url).await {
            Ok(output) => return Ok(output),
            Err(err) if err.kind.is_retryable() && attempt < max_attempts => {
                engine_warn!("Fetching {url} failed (attempt {attempt}/{max_attempts}): {err}");
                tokio::time::sleep(settings.retry_backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub saved: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, FetchError)>,
}

/// Downloads every target into `writer`'s directory. Individual failures are
/// collected, never fatal.
pub async fn download_all(
    fetcher: &dyn ImageFetcher,
    targets: Vec<FetchTarget>,
    writer: &AtomicFileWriter,
    settings: &FetchSettings,
    sink: &dyn ProgressSink,
) -> DownloadSummary {
    let total = targets.len();
    let results: Vec<(String, Result<PathBuf, FetchError>)> = stream::iter(targets)
        .map(|target| async move {
            let result = download_one(fetcher, &target, writer, settings).await;
            (target.url, result)
        })
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await;

    let mut summary = DownloadSummary::default();
    for (url, result) in results {
        sink.emit(EngineEvent::DownloadFinished {
            url: url.clone(),
            result: result.clone().map_err(|err| err.kind),
        });
        match result {
            Ok(path) => summary.saved.push((url, path)),
            Err(err) => summary.failed.push((url, err)),
        }
    }
    engine_info!(
        "Downloaded {}/{total} image(s), {} failed",
        summary.saved.len(),
        summary.failed.len()
    );
    summary
}

async fn download_one(
    fetcher: &dyn ImageFetcher,
    target: &FetchTarget,
    writer: &AtomicFileWriter,
    settings: &FetchSettings,
) -> Result<PathBuf, FetchError> {
    let output = fetch_with_retries(fetcher, &target.url, settings).await?;
    let filename = image_filename(&target.filename_hint, &target.url);
    let path = writer
        .write_bytes(&filename, &output.bytes)
        .map_err(|err| FetchError::new(FailureKind::Persist, err.to_string()))?;
    engine_debug!("Saved {} ({} bytes)", path.display(), output.bytes.len());
    Ok(path)
}
