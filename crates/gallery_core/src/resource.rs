use serde::{Deserialize, Serialize};
use url::Url;

/// Image formats in retention order: when two URLs share an equivalence key the
/// one with the lower rank is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
    Gif,
    Other,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "webp" => ImageFormat::Webp,
            "avif" => ImageFormat::Avif,
            "gif" => ImageFormat::Gif,
            _ => ImageFormat::Other,
        }
    }

    /// Detects the format from the extension of the last path segment,
    /// ignoring any query string or fragment.
    pub fn from_url(raw: &str) -> Self {
        extension_of(strip_suffixes(raw))
            .map(Self::from_extension)
            .unwrap_or(ImageFormat::Other)
    }

    fn rank(self) -> u8 {
        match self {
            ImageFormat::Jpeg => 0,
            ImageFormat::Png => 1,
            ImageFormat::Webp => 2,
            ImageFormat::Avif => 3,
            ImageFormat::Gif => 4,
            ImageFormat::Other => 5,
        }
    }

    /// True when `self` should replace `other` as the retained form.
    pub fn outranks(self, other: ImageFormat) -> bool {
        self.rank() < other.rank()
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg | ImageFormat::Other => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Gif => "gif",
        }
    }
}

/// Which candidate URLs count as gallery images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePolicy {
    /// Extensions (lowercase, no dot) that qualify a URL on their own.
    pub extensions: Vec<String>,
    /// Host substrings that qualify a URL regardless of its extension.
    pub host_substrings: Vec<String>,
    /// Extensions that never qualify, even on an allowed host (icons).
    pub excluded_extensions: Vec<String>,
    /// Resize/transform path markers; the marker and everything after it is
    /// dropped so the original asset is fetched.
    pub transform_markers: Vec<String>,
    /// Minimum reported pixel area for hero image candidates.
    pub min_hero_area: u64,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "webp", "avif", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            host_substrings: vec!["wixstatic.com".to_string()],
            excluded_extensions: vec!["svg".to_string(), "ico".to_string()],
            transform_markers: vec![
                "/v1/fill".to_string(),
                "/v1/fit".to_string(),
                "/v1/crop".to_string(),
            ],
            min_hero_area: 100_000,
        }
    }
}

/// A qualifying image URL together with its dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUrl {
    raw: String,
    key: String,
    format: ImageFormat,
}

impl ResourceUrl {
    /// Returns `None` for relative URLs, non-http schemes, and URLs outside
    /// the policy's allowlist.
    pub fn parse(raw: &str, policy: &ResourcePolicy) -> Option<Self> {
        let trimmed = strip_transform(raw.trim(), &policy.transform_markers);
        let parsed = Url::parse(trimmed).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }

        let ext = extension_of(parsed.path()).map(|e| e.to_ascii_lowercase());
        if let Some(ext) = ext.as_deref() {
            if policy.excluded_extensions.iter().any(|x| x == ext) {
                return None;
            }
        }
        let allowed_ext = ext
            .as_deref()
            .is_some_and(|ext| policy.extensions.iter().any(|x| x == ext));
        let allowed_host = parsed.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            policy
                .host_substrings
                .iter()
                .any(|needle| host.contains(needle.as_str()))
        });
        if !allowed_ext && !allowed_host {
            return None;
        }

        Some(Self::new_unchecked(trimmed))
    }

    /// Builds a resource URL without applying any policy.
    pub fn new_unchecked(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            key: equivalence_key(raw),
            format: ImageFormat::from_url(raw),
        }
    }

    /// The form used for fetching.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// Canonical form used to detect the same resource across format and query
/// variants: query and fragment removed, trailing image extension removed.
///
/// `img/a.jpg?w=200` and `img/a.webp` both map to `img/a`.
pub fn equivalence_key(raw: &str) -> String {
    let base = strip_suffixes(raw.trim());
    match extension_of(base) {
        Some(ext)
            if KEYED_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)) =>
        {
            base[..base.len() - ext.len() - 1].to_string()
        }
        _ => base.to_string(),
    }
}

const KEYED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif"];

fn strip_suffixes(raw: &str) -> &str {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    &raw[..end]
}

fn strip_transform<'a>(raw: &'a str, markers: &[String]) -> &'a str {
    markers
        .iter()
        .filter_map(|marker| raw.find(marker.as_str()))
        .min()
        .map_or(raw, |idx| &raw[..idx])
}

fn extension_of(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}
