//! Per-page text extraction, using Poppler's `pdfinfo` and `pdftotext` CLI
//! tools.

use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, is_command_not_found},
    cpu_limit::with_cpu_semaphore,
    prelude::*,
};

/// `pdftotext` ends every page with a form feed.
const PAGE_SEPARATOR: char = '\x0c';

/// Matches the page count in `pdfinfo` output.
static PAGES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").expect("failed to compile regex")
});

/// Poppler reports recoverable damage as "Syntax Error" or "Syntax Warning"
/// lines on standard error, even when it exits successfully.
static POPPLER_WARNING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error|warning").expect("failed to compile regex"));

fn is_poppler_warning_line(line: &str) -> bool {
    POPPLER_WARNING_REGEX.is_match(line)
}

/// Something which can extract the text of each page of a PDF.
#[async_trait]
pub trait TextExtractor: Send + Sync + 'static {
    /// Return the text of each page, in page order.
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>>;
}

/// [`TextExtractor`] wrapping `pdfinfo` and `pdftotext` from `poppler-utils`.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct PdfToText {}

impl PdfToText {
    /// Create a new `pdftotext` extractor.
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl TextExtractor for PdfToText {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
        let page_count = get_pdf_page_count(path).await?;

        let mut cmd = Command::new("pdftotext");
        cmd.arg("-enc").arg("UTF-8").arg(path).arg("-");
        let output = with_cpu_semaphore(|| async {
            cmd.output().await.map_err(|err| {
                if is_command_not_found(&err) {
                    anyhow!("pdftotext command not found; please install poppler-utils")
                } else {
                    anyhow!(err).context(format!(
                        "failed to run pdftotext on {:?}",
                        path.display()
                    ))
                }
            })
        })
        .await?;
        check_for_command_failure("pdftotext", &output, Some(&is_poppler_warning_line))?;

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(split_pages(&text, page_count))
    }
}

/// Get the number of pages in a PDF file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn get_pdf_page_count(path: &Path) -> Result<usize> {
    let mut cmd = Command::new("pdfinfo");
    cmd.arg(path);
    let output = with_cpu_semaphore(|| async {
        cmd.output().await.map_err(|err| {
            if is_command_not_found(&err) {
                anyhow!("pdfinfo command not found; please install poppler-utils")
            } else {
                anyhow!(err)
                    .context(format!("failed to run pdfinfo on {:?}", path.display()))
            }
        })
    })
    .await?;
    check_for_command_failure("pdfinfo", &output, Some(&is_poppler_warning_line))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout).with_context(|| {
        format!(
            "failed to parse page count for {:?} from pdfinfo output",
            path.display()
        )
    })
}

/// Extract the `Pages:` value from `pdfinfo` output.
fn parse_page_count(pdfinfo_output: &str) -> Result<usize> {
    let captures = PAGES_REGEX
        .captures(pdfinfo_output)
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    Ok(captures[1].parse::<usize>()?)
}

/// Split `pdftotext` output into exactly `page_count` pages.
///
/// Missing trailing pages become empty strings, which will always be flagged
/// for OCR.
fn split_pages(text: &str, page_count: usize) -> Vec<String> {
    let mut pages = text
        .split(PAGE_SEPARATOR)
        .take(page_count)
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if pages.len() < page_count {
        warn!(
            expected = page_count,
            found = pages.len(),
            "pdftotext returned fewer pages than pdfinfo reported"
        );
        pages.resize(page_count, String::new());
    }
    pages
}
