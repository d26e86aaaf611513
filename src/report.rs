//! Per-file output records.

use std::fmt;

use schemars::JsonSchema;

use crate::{pdf::classify::PageAnalysis, prelude::*};

/// What happened to a file.
#[derive(Clone, Copy, Debug, JsonSchema, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Every page already has enough text. No OCR was run.
    Searchable,
    /// Some pages need OCR, but we were only asked to analyze.
    NeedsOcr,
    /// OCR ran successfully.
    Ocred,
    /// Analysis or OCR failed. See `errors`.
    Failed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Searchable => "searchable",
            FileStatus::NeedsOcr => "needs_ocr",
            FileStatus::Ocred => "ocred",
            FileStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One output record per input file.
#[derive(Clone, Debug, JsonSchema, Serialize)]
pub struct FileReport {
    /// The input PDF.
    pub path: PathBuf,

    /// What happened to it.
    pub status: FileStatus,

    /// Page analysis. Absent in whole-file mode, which skips analysis.
    #[serde(flatten)]
    pub analysis: Option<PageAnalysis>,

    /// The OCRed PDF, if OCR succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Any errors from analysis or OCR.
    pub errors: Vec<String>,
}

/// Counts of files by status, for the end-of-run log line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub searchable: usize,
    pub needs_ocr: usize,
    pub ocred: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Count a report.
    pub fn record(&mut self, report: &FileReport) {
        match report.status {
            FileStatus::Searchable => self.searchable += 1,
            FileStatus::NeedsOcr => self.needs_ocr += 1,
            FileStatus::Ocred => self.ocred += 1,
            FileStatus::Failed => self.failed += 1,
        }
    }

    /// Total number of files seen.
    pub fn total(&self) -> usize {
        self.searchable + self.needs_ocr + self.ocred + self.failed
    }

    /// Log our totals.
    pub fn log(&self) {
        info!(
            total = self.total(),
            searchable = self.searchable,
            needs_ocr = self.needs_ocr,
            ocred = self.ocred,
            failed = self.failed,
            "batch complete"
        );
        if self.failed > 0 {
            warn!("{} of {} files failed", self.failed, self.total());
        }
    }
}
