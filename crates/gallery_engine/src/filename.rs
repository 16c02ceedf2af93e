use sha2::{Digest, Sha256};

use gallery_core::ImageFormat;

const MAX_SEGMENT_LEN: usize = 64;

/// Relative path for a downloaded image: `{hint segments}--{hash8}.{ext}`.
///
/// Each `/`-separated segment of the hint becomes a directory (the last one
/// the file stem), reduced to lowercase ASCII letters, digits, `-` and `_`.
/// The hash makes distinct URLs with equal hints distinct files; the
/// extension follows the URL's format.
pub fn image_filename(hint: &str, url: &str) -> String {
    let segments: Vec<String> = hint
        .split('/')
        .map(clean_segment)
        .filter(|segment| !segment.is_empty())
        .collect();
    let stem = if segments.is_empty() {
        "image".to_string()
    } else {
        segments.join("/")
    };
    format!(
        "{stem}--{}.{}",
        url_digest(url),
        ImageFormat::from_url(url).extension()
    )
}

fn clean_segment(raw: &str) -> String {
    let mut segment = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            segment.push(c.to_ascii_lowercase());
        } else if !segment.ends_with('-') {
            segment.push('-');
        }
    }
    let mut segment = segment.trim_matches('-').to_string();
    // ASCII only, so any byte index is a char boundary.
    segment.truncate(MAX_SEGMENT_LEN);
    if is_reserved_device_name(&segment) {
        segment.push('_');
    }
    segment
}

/// Names Windows refuses as file or directory names.
fn is_reserved_device_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            (upper.starts_with("COM") || upper.starts_with("LPT"))
                && upper.len() == 4
                && upper.as_bytes()[3].is_ascii_digit()
                && upper.as_bytes()[3] != b'0'
        }
    }
}

fn url_digest(url: &str) -> String {
    Sha256::digest(url.as_bytes())[..4]
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
