use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod batch;
mod cmd;
mod cpu_limit;
mod ocr;
mod pdf;
mod prelude;
mod report;
mod ui;

/// Find PDF pages without a usable text layer, and OCR them.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
External tools:
  - pdfinfo and pdftotext (from poppler-utils) are used to read text layers.
  - ocrmypdf is used to add text layers.

Environment Variables:
  - RUST_LOG (optional): Log filter, such as "debug" or "ocr_sweep=trace".
  - OCR_SWEEP_* (optional): Defaults for most options. See each
    subcommand's --help.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// OCR only the pages of each PDF that have little or no text.
    Scan(cmd::scan::ScanOpts),
    /// Force OCR on every page of every PDF, several files at a time.
    Batch(cmd::batch::BatchOpts),
    /// Report which pages need OCR, without running it.
    Analyze(cmd::analyze::AnalyzeOpts),
    /// Print the JSON Schema for report records.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Scan(opts) => opts.source.report_path.is_none(),
            Cmd::Batch(opts) => opts.source.report_path.is_none(),
            Cmd::Analyze(opts) => opts.source.report_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists. This must
    // happen before parsing, because options may come from the environment.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Hide the progress bar if we're using stdout for output.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Scan(opts) => cmd::scan::cmd_scan(&ui, opts).await?,
        Cmd::Batch(opts) => cmd::batch::cmd_batch(&ui, opts).await?,
        Cmd::Analyze(opts) => cmd::analyze::cmd_analyze(&ui, opts).await?,
        Cmd::Schema(opts) => cmd::schema::cmd_schema(opts).await?,
    }
    Ok(())
}
