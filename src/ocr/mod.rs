//! Adding text layers with an external OCR tool.

use std::fmt;

use crate::prelude::*;

pub mod ocrmypdf;

/// Which pages of a file to OCR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OcrMode {
    /// Redo OCR on these 1-based pages only, keeping any existing text
    /// elsewhere.
    Pages(Vec<u32>),
    /// Force OCR on every page, replacing any existing text layer.
    WholeFile,
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrMode::Pages(pages) => write!(f, "pages {}", page_list_arg(pages)),
            OcrMode::WholeFile => write!(f, "whole file"),
        }
    }
}

/// A single OCR invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcrJob {
    /// The PDF to read.
    pub input: PathBuf,
    /// Where to write the OCRed PDF.
    pub output: PathBuf,
    /// Which pages to process.
    pub mode: OcrMode,
}

/// Something which can add a text layer to a PDF.
#[async_trait]
pub trait OcrTool: Send + Sync + 'static {
    /// Run OCR. Errors describe why the tool failed, and are reported per
    /// file rather than aborting a batch.
    async fn run(&self, job: &OcrJob) -> Result<()>;
}

/// Format page numbers the way `ocrmypdf --pages` expects: `1,3,7`.
pub fn page_list_arg(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
