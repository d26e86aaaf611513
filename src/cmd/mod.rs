//! Command-line entry points.

use std::sync::Arc;

use clap::Args;

use crate::{
    async_utils::io::JsonlWriter,
    batch::{Batch, BatchMode, ensure_output_dir, list_pdf_files},
    ocr::ocrmypdf::DEFAULT_PROGRAM,
    prelude::*,
    ui::Ui,
};

pub mod analyze;
pub mod batch;
pub mod scan;
pub mod schema;

/// Where to find input PDFs, and where to write reports.
#[derive(Debug, Clone, Args)]
pub struct SourceOpts {
    /// Directory containing the PDFs to process.
    #[clap(long = "source", env = "OCR_SWEEP_SOURCE", default_value = "archive")]
    pub source_dir: PathBuf,

    /// Write JSONL reports to this file instead of standard output.
    #[clap(long = "report", env = "OCR_SWEEP_REPORT")]
    pub report_path: Option<PathBuf>,
}

/// Options for subcommands that run the OCR tool.
#[derive(Debug, Clone, Args)]
pub struct OcrOpts {
    /// Directory to write OCRed PDFs to. Created if missing.
    #[clap(long = "output", env = "OCR_SWEEP_OUTPUT", default_value = "ocr")]
    pub output_dir: PathBuf,

    /// The OCR program to run.
    #[clap(long, env = "OCR_SWEEP_OCR_PROGRAM", default_value = DEFAULT_PROGRAM)]
    pub ocr_program: PathBuf,
}

/// Find the input files and run a batch over them, writing reports.
///
/// A missing source directory or an empty batch is logged, not returned as
/// an error. The output directory is only created once the source directory
/// has been listed.
#[instrument(level = "debug", skip_all, fields(source_dir = %source.source_dir.display()))]
pub async fn run_batch(
    ui: &Ui,
    batch: Batch,
    source: &SourceOpts,
    skip_suffix: Option<&str>,
    jobs: usize,
) -> Result<()> {
    let files = match list_pdf_files(&source.source_dir, skip_suffix).await {
        Ok(files) => files,
        Err(err) => {
            error!("source folder is not usable: {:#}", err);
            return Ok(());
        }
    };
    if !matches!(batch.mode, BatchMode::Analyze) {
        ensure_output_dir(&batch.output_dir).await?;
    }
    if files.is_empty() {
        info!(
            source_dir = %source.source_dir.display(),
            "no new PDF files to process"
        );
        return Ok(());
    }

    info!(count = files.len(), "found PDF files to process");
    for file in &files {
        debug!(file = %file.display(), "queued");
    }

    let mut writer = JsonlWriter::create(source.report_path.as_deref()).await?;
    Arc::new(batch).run(ui, files, jobs, &mut writer).await?;
    writer.finish().await
}
