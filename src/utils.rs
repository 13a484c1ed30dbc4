use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use regex::{Captures, Regex};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, PipelineResult};

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Extracts the item identifier from an archive.org URL or returns a bare
/// identifier unchanged.
///
/// Accepted forms: `https://archive.org/details/{id}`, `/download/{id}/...`,
/// `/embed/{id}`, with or without scheme and `www.`, query or fragment, and
/// the bare `{id}`.
pub fn parse_identifier(input: &str) -> PipelineResult<String> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);

    let candidate = if let Some(rest) = without_www.strip_prefix("archive.org/") {
        let path = rest.split(['?', '#']).next().unwrap_or("");
        let mut segments = path.split('/');
        match segments.next() {
            Some("details") | Some("download") | Some("embed") => segments.next().unwrap_or(""),
            _ => "",
        }
    } else if without_www.contains('/') {
        ""
    } else {
        without_www
    };

    if is_valid_identifier(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(PipelineError::InvalidInput(input.to_string()))
    }
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier.len() <= 100
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !identifier.starts_with('.')
}

/// Last path component of an archive.org file name.
pub fn base_name(file_name: &str) -> &str {
    file_name.rsplit('/').next().unwrap_or(file_name)
}

pub fn file_extension(file_name: &str) -> Option<String> {
    let base = base_name(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn file_stem(file_name: &str) -> &str {
    let base = base_name(file_name);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    }
}

pub fn audio_file_name(identifier: &str, number: u32, original: &str) -> String {
    let base = base_name(original);
    let base = if base.is_empty() { "audio_file" } else { base };
    format!("{}_track_{}_{}", identifier, number, base)
}

pub fn video_file_name(identifier: &str, number: u32) -> String {
    format!("{}_video_{}.mp4", identifier, number)
}

pub fn background_file_name(identifier: &str) -> String {
    format!("{}_background_image.jpg", identifier)
}

/// First string found in a metadata value (string, number or array).
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(value_to_string),
        _ => None,
    }
}

/// Parses archive.org track tags such as `"3"`, `"03"` or `"3/12"`.
pub fn parse_track_number(track: Option<&str>) -> Option<u32> {
    let raw = track?;
    let head = raw.split('/').next().unwrap_or(raw);
    head.trim().parse().ok()
}

/// Parses archive.org `length` values: `"225.5"`, `"3:45"`, `"1:02:03"`.
pub fn parse_duration(length: Option<&str>) -> Option<f64> {
    let raw = length?.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains(':') {
        return raw.parse::<f64>().ok().filter(|d| *d >= 0.0);
    }

    let mut total = 0.0;
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    for part in parts {
        let value: f64 = part.trim().parse().ok()?;
        total = total * 60.0 + value;
    }
    Some(total)
}

/// `m:ss` or `h:mm:ss`, `-` when unknown.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "-".to_string();
    };
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static HTML_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(amp|lt|gt|quot|#39|nbsp);").expect("valid regex"));

/// Removes tags and decodes the handful of entities archive.org metadata
/// carries. Each entity is decoded once, so `&amp;lt;` stays `&lt;`.
pub fn strip_html(input: &str) -> String {
    let text = HTML_TAG.replace_all(input, "");
    HTML_ENTITY
        .replace_all(&text, |caps: &Captures| {
            match &caps[1] {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "#39" => "'",
                _ => " ",
            }
            .to_string()
        })
        .into_owned()
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display name for a track: tags stripped, first line only, whitespace
/// collapsed, at most 100 characters, `Track {n}` when nothing is left.
pub fn sanitize_track_name(raw: &str, number: u32) -> String {
    let text = strip_html(raw);
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let name = truncate_chars(&collapse_whitespace(first_line), 100);
    if name.is_empty() {
        format!("Track {}", number)
    } else {
        name
    }
}

/// YouTube rejects `<` and `>` in titles and descriptions.
pub fn youtube_safe(input: &str) -> String {
    input.replace(['<', '>'], "")
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Clips to `max_bytes` on a char boundary.
pub fn clip_bytes(input: &str, max_bytes: usize) -> &str {
    if input.len() <= max_bytes {
        return input;
    }
    let mut end = max_bytes;
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    &input[..end]
}

/// Magic-byte check for the still image formats ffmpeg can loop.
pub fn looks_like_image(header: &[u8]) -> bool {
    header.starts_with(&[0xFF, 0xD8, 0xFF])
        || header.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
        || header.starts_with(b"GIF87a")
        || header.starts_with(b"GIF89a")
        || (header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP")
        || header.starts_with(b"BM")
}
