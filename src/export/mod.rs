//! Files produced for use outside the app: merged scan PDFs and the visit
//! workbook with its attachment folder.

pub mod scans;
pub mod workbook;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::attachments::AttachmentError;
use crate::db::DatabaseError;

pub use scans::*;
pub use workbook::*;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    #[error("Not a folder: {0}")]
    NotAFolder(PathBuf),

    #[error("No supported images in {0}")]
    NoImages(PathBuf),

    #[error("None of the {total} images could be read")]
    NothingMerged { total: usize },

    #[error("No visit records to export")]
    NoRecords,

    #[error("JPEG quality must be 1-100, got {0}")]
    InvalidQuality(u8),

    #[error("Image error in {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid export target: {0}")]
    InvalidTarget(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ExportError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
