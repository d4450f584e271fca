//! Uploaded file context
//!
//! Turns a file the user attached to the session into a short textual
//! summary for the prompt, plus an inline binary attachment when the
//! generation service can look at the file itself (images). A file that
//! cannot be summarized becomes a plain note; it never aborts an exchange.

pub mod raster;
pub mod tabular;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::{RagError, Result};

/// Classification of an uploaded file by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Comma separated values
    Csv,
    /// Excel workbook (xlsx/xls)
    Workbook,
    /// Raster image
    Image,
    Unsupported,
}

impl FileKind {
    pub fn classify(file_name: &str) -> Self {
        match extension(file_name).as_deref() {
            Some("csv") => FileKind::Csv,
            Some("xlsx") | Some("xls") => FileKind::Workbook,
            Some("png") | Some("jpg") | Some("jpeg") | Some("bmp") | Some("gif") | Some("webp") => {
                FileKind::Image
            }
            _ => FileKind::Unsupported,
        }
    }

    pub fn is_tabular(&self) -> bool {
        matches!(self, FileKind::Csv | FileKind::Workbook)
    }
}

/// Inline binary content sent alongside the final user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    mime_type: String,
    data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Summary of an uploaded file, ready to be placed in a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct UploadContext {
    file_name: String,
    summary: String,
    attachment: Option<Attachment>,
}

impl UploadContext {
    /// Text-only context
    pub fn note(file_name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            summary: summary.into(),
            attachment: None,
        }
    }

    /// Summary plus inline binary content
    pub fn with_attachment(
        file_name: impl Into<String>,
        summary: impl Into<String>,
        attachment: Attachment,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            summary: summary.into(),
            attachment: Some(attachment),
        }
    }

    /// Summarize raw file contents
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Self {
        let kind = FileKind::classify(file_name);
        debug!(file = file_name, ?kind, size = bytes.len(), "summarizing upload");

        match kind {
            FileKind::Csv | FileKind::Workbook => {
                let parsed = if kind == FileKind::Csv {
                    tabular::summarize_csv(bytes)
                } else {
                    tabular::summarize_workbook(bytes)
                };
                match parsed {
                    Ok(table) => Self::note(file_name, table.render(file_name)),
                    Err(e) => {
                        warn!(file = file_name, error = %e, "tabular upload parse failed");
                        Self::note(
                            file_name,
                            format!("Uploaded tabular file parse failed: {}, error: {}", file_name, e),
                        )
                    }
                }
            }
            FileKind::Image => match raster::describe(bytes) {
                Ok(info) => Self::with_attachment(
                    file_name,
                    info.render(file_name),
                    Attachment::new(raster::mime_type_for(file_name), bytes.to_vec()),
                ),
                Err(e) => {
                    warn!(file = file_name, error = %e, "image upload parse failed");
                    Self::note(
                        file_name,
                        format!("Uploaded image parse failed: {}, error: {}", file_name, e),
                    )
                }
            },
            FileKind::Unsupported => {
                let err = RagError::UnsupportedAttachment(file_name.to_string());
                warn!(error = %err, "degrading upload to a note");
                Self::note(file_name, format!("Unsupported uploaded file type: {}", file_name))
            }
        }
    }

    /// Read and summarize a file from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RagError::Generic(format!("Not a file: {}", path.display())))?;
        Ok(Self::from_bytes(&file_name, &bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
