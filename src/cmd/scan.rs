//! The `scan` subcommand.

use std::sync::Arc;

use clap::Args;

use crate::{
    batch::{Batch, BatchMode},
    ocr::ocrmypdf::{DEFAULT_LANGUAGES, OcrMyPdf},
    pdf::{classify::DEFAULT_THRESHOLD, text::PdfToText},
    prelude::*,
    ui::Ui,
};

use super::{OcrOpts, SourceOpts, run_batch};

/// `scan` command line arguments.
#[derive(Debug, Args)]
pub struct ScanOpts {
    #[clap(flatten)]
    pub source: SourceOpts,

    #[clap(flatten)]
    pub ocr: OcrOpts,

    /// Tesseract languages, joined with `+`.
    #[clap(short = 'l', long, env = "OCR_SWEEP_LANGUAGES", default_value = DEFAULT_LANGUAGES)]
    pub languages: String,

    /// Pages with this many characters of text or fewer get OCRed.
    #[clap(long, env = "OCR_SWEEP_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: usize,

    /// Skip input files named `<stem><SUFFIX>.pdf`.
    #[clap(long, env = "OCR_SWEEP_SKIP_SUFFIX", value_name = "SUFFIX")]
    pub skip_suffix: Option<String>,

    /// Number of files to process at a time.
    #[clap(short = 'j', long = "jobs", env = "OCR_SWEEP_JOBS", default_value = "1")]
    pub job_count: usize,
}

/// The `scan` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_scan(ui: &Ui, opts: &ScanOpts) -> Result<()> {
    let batch = Batch {
        extractor: Arc::new(PdfToText::new()),
        ocr: Arc::new(OcrMyPdf::new(&opts.ocr.ocr_program, &opts.languages)),
        mode: BatchMode::Selective,
        output_dir: opts.ocr.output_dir.clone(),
        threshold: opts.threshold,
    };
    run_batch(
        ui,
        batch,
        &opts.source,
        opts.skip_suffix.as_deref(),
        opts.job_count,
    )
    .await
}
