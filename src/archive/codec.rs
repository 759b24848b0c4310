//! Archive decoding.
//!
//! [`ArchiveCodec`] is the boundary the expander talks to. [`NativeCodec`]
//! handles zip, tar and the gzip / bzip2 / xz / lzma compressions in-process.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::ArchiveError;

/// Extracts an archive into a destination folder.
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Extracts every member of `archive` below `dest`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the archive is unreadable or its
    /// format is not supported.
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError>;
}

/// Container and compression layout, derived from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`
    Zip,
    /// `.tar`
    Tar,
    /// `.tar.gz`, `.tgz`
    TarGz,
    /// `.tar.bz2`, `.tbz2`
    TarBz2,
    /// `.tar.xz`, `.txz`
    TarXz,
    /// Single gzip stream (including `.ntar.gz`).
    Gz,
    /// Single bzip2 stream.
    Bz2,
    /// Single xz stream.
    Xz,
    /// Single legacy lzma stream.
    Lzma,
    /// `.rar`, recognized but not decodable here.
    Rar,
}

impl ArchiveFormat {
    /// Detects the format from a file name, case-insensitively.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let format = if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".ntar.gz") {
            Self::Gz
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Self::TarBz2
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Self::TarXz
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".gz") {
            Self::Gz
        } else if lower.ends_with(".bz2") {
            Self::Bz2
        } else if lower.ends_with(".xz") {
            Self::Xz
        } else if lower.ends_with(".lzma") {
            Self::Lzma
        } else if lower.ends_with(".rar") {
            Self::Rar
        } else {
            return None;
        };
        Some(format)
    }
}

/// In-process codec built on the `zip`, `tar`, `flate2`, `bzip2` and `xz2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

#[async_trait]
impl ArchiveCodec for NativeCodec {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
        let archive_path = archive.to_path_buf();
        let dest_path = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &dest_path))
            .await
            .map_err(|e| ArchiveError::Task {
                path: archive.to_path_buf(),
                message: e.to_string(),
            })?
    }
}

fn extract_blocking(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(format) = ArchiveFormat::from_file_name(&name) else {
        return Err(ArchiveError::unsupported(archive, "unknown"));
    };
    debug!(archive = %archive.display(), ?format, "extracting");

    let open = || {
        File::open(archive)
            .map(BufReader::new)
            .map_err(|e| ArchiveError::io(archive, e))
    };

    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::Tar => unpack_tar(open()?, archive, dest),
        ArchiveFormat::TarGz => unpack_tar(flate2::read::GzDecoder::new(open()?), archive, dest),
        ArchiveFormat::TarBz2 => unpack_tar(bzip2::read::BzDecoder::new(open()?), archive, dest),
        ArchiveFormat::TarXz => unpack_tar(xz2::read::XzDecoder::new(open()?), archive, dest),
        ArchiveFormat::Gz => decompress_single(
            flate2::read::GzDecoder::new(open()?),
            archive,
            &single_member_path(&name, dest),
        ),
        ArchiveFormat::Bz2 => decompress_single(
            bzip2::read::BzDecoder::new(open()?),
            archive,
            &single_member_path(&name, dest),
        ),
        ArchiveFormat::Xz => decompress_single(
            xz2::read::XzDecoder::new(open()?),
            archive,
            &single_member_path(&name, dest),
        ),
        ArchiveFormat::Lzma => {
            let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                .map_err(|e| ArchiveError::io(archive, std::io::Error::other(e)))?;
            decompress_single(
                xz2::read::XzDecoder::new_stream(open()?, stream),
                archive,
                &single_member_path(&name, dest),
            )
        }
        ArchiveFormat::Rar => Err(ArchiveError::unsupported(archive, "rar")),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::zip(archive, e))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ArchiveError::zip(archive, e))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(archive = %archive.display(), entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| ArchiveError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| ArchiveError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::io(&out_path, e))?;
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    tar::Archive::new(reader)
        .unpack(dest)
        .map_err(|e| ArchiveError::io(archive, e))
}

fn decompress_single<R: Read>(
    mut reader: R,
    archive: &Path,
    out_path: &Path,
) -> Result<(), ArchiveError> {
    let mut out = File::create(out_path).map_err(|e| ArchiveError::io(out_path, e))?;
    if let Err(e) = std::io::copy(&mut reader, &mut out) {
        let _ = std::fs::remove_file(out_path);
        return Err(ArchiveError::io(archive, e));
    }
    Ok(())
}

/// Output path for a single-stream compression: the archive name minus its
/// last suffix, placed in `dest`.
fn single_member_path(archive_name: &str, dest: &Path) -> PathBuf {
    let member = archive_name
        .rsplit_once('.')
        .map_or(archive_name, |(stem, _)| stem);
    dest.join(member)
}
