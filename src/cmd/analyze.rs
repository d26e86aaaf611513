//! The `analyze` subcommand.

use std::sync::Arc;

use clap::Args;

use crate::{
    batch::{Batch, BatchMode},
    ocr::ocrmypdf::{DEFAULT_LANGUAGES, DEFAULT_PROGRAM, OcrMyPdf},
    pdf::{classify::DEFAULT_THRESHOLD, text::PdfToText},
    prelude::*,
    ui::Ui,
};

use super::{SourceOpts, run_batch};

/// `analyze` command line arguments.
#[derive(Debug, Args)]
pub struct AnalyzeOpts {
    #[clap(flatten)]
    pub source: SourceOpts,

    /// Pages with this many characters of text or fewer are flagged.
    #[clap(long, env = "OCR_SWEEP_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: usize,

    /// Skip input files named `<stem><SUFFIX>.pdf`.
    #[clap(long, env = "OCR_SWEEP_SKIP_SUFFIX", value_name = "SUFFIX")]
    pub skip_suffix: Option<String>,

    /// Number of files to analyze at a time.
    #[clap(short = 'j', long = "jobs", env = "OCR_SWEEP_JOBS", default_value = "1")]
    pub job_count: usize,
}

/// The `analyze` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_analyze(ui: &Ui, opts: &AnalyzeOpts) -> Result<()> {
    let batch = Batch {
        extractor: Arc::new(PdfToText::new()),
        // Never called in analyze mode.
        ocr: Arc::new(OcrMyPdf::new(DEFAULT_PROGRAM, DEFAULT_LANGUAGES)),
        mode: BatchMode::Analyze,
        output_dir: PathBuf::new(),
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
