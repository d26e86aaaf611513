//! The `batch` subcommand.

use std::sync::Arc;

use clap::Args;

use crate::{
    batch::{Batch, BatchMode},
    ocr::ocrmypdf::OcrMyPdf,
    pdf::{classify::DEFAULT_THRESHOLD, text::PdfToText},
    prelude::*,
    ui::Ui,
};

use super::{OcrOpts, SourceOpts, run_batch};

/// `batch` command line arguments.
#[derive(Debug, Args)]
pub struct BatchOpts {
    #[clap(flatten)]
    pub source: SourceOpts,

    #[clap(flatten)]
    pub ocr: OcrOpts,

    /// Tesseract languages, joined with `+`.
    #[clap(short = 'l', long, env = "OCR_SWEEP_LANGUAGES", default_value = "eng+ell+tur")]
    pub languages: String,

    /// Appended to each output file's stem. Inputs that already end with it
    /// are skipped.
    #[clap(long, env = "OCR_SWEEP_SUFFIX", default_value = "_ocr")]
    pub suffix: String,

    /// Number of files to OCR at a time. Defaults to the number of CPUs.
    #[clap(short = 'j', long = "jobs", env = "OCR_SWEEP_JOBS")]
    pub job_count: Option<usize>,
}

/// The `batch` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_batch(ui: &Ui, opts: &BatchOpts) -> Result<()> {
    let batch = Batch {
        // Not used in whole-file mode.
        extractor: Arc::new(PdfToText::new()),
        ocr: Arc::new(OcrMyPdf::new(&opts.ocr.ocr_program, &opts.languages)),
        mode: BatchMode::WholeFile {
            suffix: opts.suffix.clone(),
        },
        output_dir: opts.ocr.output_dir.clone(),
        threshold: DEFAULT_THRESHOLD,
    };
    let job_count = opts.job_count.unwrap_or_else(num_cpus::get);
    run_batch(ui, batch, &opts.source, Some(&opts.suffix), job_count).await
}
