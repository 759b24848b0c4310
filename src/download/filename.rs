//! Deterministic mapping from a capture URL to its place in the cache.
//!
//! Everything here is pure: the same URL always yields the same paths, and
//! no filesystem or network access happens.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::error::DownloadError;
use crate::archive::strip_archive_ext;

/// Trailing run of characters that may appear in a cached file name.
#[allow(clippy::expect_used)]
static FILE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^=\\/|?*:'"<>]+$"#).expect("file name regex is valid") // Static pattern, safe to panic
});

/// Extensions that are never captures. Rejected before any request.
pub const NON_CAPTURE_EXTENSIONS: &[&str] = &[
    "html", "htm", "txt", "pdf", "png", "jpg", "jpeg", "gif", "svg", "c", "h", "py", "sh", "md",
    "doc", "docx", "xls", "exe", "dll", "js", "css", "patch", "diff",
];

/// Where a URL lives in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePath {
    /// Sanitized file name as served (archive suffix intact).
    pub file_name: String,
    /// Path the response body is written to.
    pub download_path: PathBuf,
    /// Path handed to the pipeline: the file itself, or the expansion folder
    /// when the URL names an archive.
    pub target: PathBuf,
}

impl CachePath {
    /// Whether the URL names an archive.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        self.download_path != self.target
    }
}

/// Derives the cache location for `url` under `root`.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] if the URL does not parse, has no
/// host, or does not end in a usable file name.
pub fn cache_path_for_url(root: &Path, url: &str) -> Result<CachePath, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| DownloadError::invalid_url(url))?;
    let file_name = file_name_from_url(url).ok_or_else(|| DownloadError::invalid_url(url))?;

    let site_dir = root.join(site_folder(host));
    let download_path = site_dir.join(&file_name);
    let target = site_dir.join(strip_archive_ext(&file_name));

    Ok(CachePath {
        file_name,
        download_path,
        target,
    })
}

/// Extracts the sanitized file name a URL points at.
///
/// Control characters are removed, the trailing run of name characters is
/// taken (so query delimiters such as `?`, `=` and `/` cut the name),
/// percent entities are decoded and spaces become underscores.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<String> {
    let cleaned: String = url.chars().filter(|c| !c.is_control()).collect();
    let raw = FILE_NAME_PATTERN.find(&cleaned)?.as_str();
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |d| d.into_owned());
    let name: String = decoded
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

/// Maps a source host to its cache subfolder.
///
/// Known capture sites get short fixed names; any other host gets its own
/// folder named after the host.
#[must_use]
pub fn site_folder(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    if host == "wireshark.org" || host.ends_with(".wireshark.org") {
        "ws".to_string()
    } else if host == "packetlife.net" || host.ends_with(".packetlife.net") {
        "pl".to_string()
    } else {
        host.replace(['.', ':', '[', ']'], "-")
    }
}

/// Returns the lowercased extension of `file_name` if it is a known
/// non-capture type.
#[must_use]
pub fn non_capture_extension(file_name: &str) -> Option<String> {
    let (_, extension) = file_name.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    NON_CAPTURE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}
