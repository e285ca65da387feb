//! Download packaging
//!
//! A single purchased copy is streamed straight from the original. Several
//! copies are packed into a store-only ZIP spooled to an anonymous temp file,
//! so memory use does not grow with quantity or file size.

use std::fmt;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tokio_util::io::ReaderStream;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use photo_core::validation::{MAX_QUANTITY_PER_ITEM, bundle_file_name, copy_file_name};

use crate::error::{DownloadError, Result};

/// Shape of the delivered payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadKind {
    /// The original file
    Single,
    /// A ZIP holding `copies` identical files
    Bundle { copies: u32 },
}

/// A ready-to-stream download
pub struct Download {
    /// Name offered in `Content-Disposition`
    pub file_name: String,
    pub content_type: String,
    /// Exact body length in bytes
    pub content_length: u64,
    pub kind: DownloadKind,
    pub body: ReaderStream<tokio::fs::File>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Stream the original file as-is
pub async fn single(source: &Path, file_name: &str) -> Result<Download> {
    let file = tokio::fs::File::open(source).await?;
    let content_length = file.metadata().await?.len();

    Ok(Download {
        file_name: file_name.to_owned(),
        content_type: mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_owned(),
        content_length,
        kind: DownloadKind::Single,
        body: ReaderStream::new(file),
    })
}

/// Package `copies` copies of the original into a store-only ZIP
pub async fn bundle(source: PathBuf, file_name: &str, copies: u32) -> Result<Download> {
    if copies > MAX_QUANTITY_PER_ITEM {
        return Err(DownloadError::Packaging(format!(
            "{copies} copies exceeds the per-item limit of {MAX_QUANTITY_PER_ITEM}"
        )));
    }

    let entry_name = file_name.to_owned();

    let spooled = tokio::task::spawn_blocking(move || write_bundle(&source, &entry_name, copies))
        .await
        .map_err(|e| DownloadError::Packaging(e.to_string()))??;

    let content_length = spooled.metadata()?.len();

    Ok(Download {
        file_name: bundle_file_name(file_name),
        content_type: "application/zip".into(),
        content_length,
        kind: DownloadKind::Bundle { copies },
        body: ReaderStream::new(tokio::fs::File::from_std(spooled)),
    })
}

/// Write the archive to an unlinked temp file and rewind it
fn write_bundle(source: &Path, file_name: &str, copies: u32) -> Result<std::fs::File> {
    let source_len = std::fs::metadata(source)?.len();
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(source_len >= u64::from(u32::MAX));

    let mut archive = ZipWriter::new(tempfile::tempfile()?);
    for n in 1..=copies {
        archive.start_file(copy_file_name(file_name, n), options)?;
        let mut original = std::fs::File::open(source)?;
        std::io::copy(&mut original, &mut archive)?;
    }

    let mut spooled = archive.finish()?;
    spooled.seek(SeekFrom::Start(0))?;
    Ok(spooled)
}
