//! Decide which pages of a PDF lack a usable text layer.

use schemars::JsonSchema;

use crate::prelude::*;

use super::text::TextExtractor;

/// Pages with this many characters of text or fewer are flagged for OCR.
pub const DEFAULT_THRESHOLD: usize = 52;

/// MIME type we require before handing a file to Poppler.
const PDF_MIME_TYPE: &str = "application/pdf";

/// Per-page text statistics for one PDF.
#[derive(Clone, Debug, Default, JsonSchema, Serialize)]
pub struct PageAnalysis {
    /// Number of pages in the document. Zero if it could not be read.
    pub page_count: usize,

    /// Characters of extracted text on each page, ignoring surrounding
    /// whitespace.
    pub char_counts: Vec<usize>,

    /// 1-based numbers of pages that need OCR, in ascending order.
    pub pages_needing_ocr: Vec<u32>,

    /// Problems encountered while reading the document. Reported through
    /// [`crate::report::FileReport::errors`].
    #[serde(skip)]
    pub errors: Vec<String>,
}

/// Count the characters on a page, ignoring leading and trailing whitespace.
pub fn page_char_count(text: &str) -> usize {
    text.trim().chars().count()
}

/// Return the 1-based numbers of pages with `threshold` characters or fewer.
pub fn pages_needing_ocr(char_counts: &[usize], threshold: usize) -> Vec<u32> {
    char_counts
        .iter()
        .zip(1..)
        .filter(|&(&count, _)| count <= threshold)
        .map(|(_, page)| page)
        .collect()
}

/// Analyze a PDF on disk.
///
/// This never fails. A missing or unreadable file is logged, and produces an
/// analysis with no pages needing OCR and the error recorded.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn analyze_pdf(
    extractor: &dyn TextExtractor,
    path: &Path,
    threshold: usize,
) -> PageAnalysis {
    match try_analyze_pdf(extractor, path, threshold).await {
        Ok(analysis) => analysis,
        Err(err) => {
            error!(path = %path.display(), "could not analyze PDF: {:#}", err);
            PageAnalysis {
                errors: vec![format!("{:#}", err)],
                ..PageAnalysis::default()
            }
        }
    }
}

async fn try_analyze_pdf(
    extractor: &dyn TextExtractor,
    path: &Path,
    threshold: usize,
) -> Result<PageAnalysis> {
    check_is_pdf(path)?;

    let texts = extractor.page_texts(path).await?;
    let char_counts = texts
        .iter()
        .map(|text| page_char_count(text))
        .collect::<Vec<_>>();
    for (idx, count) in char_counts.iter().enumerate() {
        debug!(page = idx + 1, chars = count, "page text length");
    }

    let pages_needing_ocr = pages_needing_ocr(&char_counts, threshold);
    if pages_needing_ocr.is_empty() {
        info!(
            path = %path.display(),
            pages = texts.len(),
            "no pages need OCR; document appears to be fully searchable"
        );
    } else {
        info!(
            path = %path.display(),
            pages = texts.len(),
            flagged = pages_needing_ocr.len(),
            "found pages that likely need OCR"
        );
    }

    Ok(PageAnalysis {
        page_count: texts.len(),
        char_counts,
        pages_needing_ocr,
        errors: vec![],
    })
}

/// Make sure `path` exists and isn't obviously some other kind of file.
///
/// Files `infer` can't identify are passed through, because Poppler accepts
/// PDFs with junk (such as a BOM) before the `%PDF-` header.
fn check_is_pdf(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("the file {:?} was not found", path.display()));
    }
    let mime_type = infer::get_from_path(path)
        .with_context(|| format!("failed to read {:?}", path.display()))?
        .map(|kind| kind.mime_type());
    match mime_type {
        Some(PDF_MIME_TYPE) | None => Ok(()),
        Some(other) => Err(anyhow!(
            "{:?} is not a PDF (detected {})",
            path.display(),
            other
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::pdf::text::PdfToText;

    /// Smallest header `infer` will recognize as a PDF.
    pub(crate) const PDF_MAGIC: &[u8] = b"%PDF-1.4\n";

    /// Returns canned page texts, keyed by file name.
    #[derive(Default)]
    pub(crate) struct FakeExtractor {
        pub(crate) pages: HashMap<String, Vec<String>>,
        pub(crate) calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeExtractor {
        pub(crate) fn with_file(mut self, name: &str, char_counts: &[usize]) -> Self {
            let texts = char_counts.iter().map(|&n| "x".repeat(n)).collect();
            self.pages.insert(name.to_owned(), texts);
            self
        }
    }

    #[async_trait]
    impl TextExtractor for FakeExtractor {
        async fn page_texts(&self, path: &Path) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(path.to_owned());
            let name = path.file_name().unwrap().to_string_lossy();
            self.pages
                .get(name.as_ref())
                .cloned()
                .ok_or_else(|| anyhow!("cannot parse {name}"))
        }
    }

    #[test]
    fn counts_characters_without_surrounding_whitespace() {
        assert_eq!(page_char_count(""), 0);
        assert_eq!(page_char_count(" \n\t "), 0);
        assert_eq!(page_char_count("  Καλημέρα \n"), 8);
    }

    #[test]
    fn flags_short_pages_by_one_based_number() {
        assert_eq!(pages_needing_ocr(&[10, 100, 40], DEFAULT_THRESHOLD), vec![1, 3]);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(pages_needing_ocr(&[52, 53, 0], DEFAULT_THRESHOLD), vec![1, 3]);
    }

    #[test]
    fn long_pages_are_never_flagged() {
        assert!(pages_needing_ocr(&[53, 500, 10_000], DEFAULT_THRESHOLD).is_empty());
    }

    #[tokio::test]
    async fn analyzes_a_three_page_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mixed.pdf");
        std::fs::write(&path, PDF_MAGIC)?;
        let extractor = FakeExtractor::default().with_file("mixed.pdf", &[10, 100, 40]);

        let analysis = analyze_pdf(&extractor, &path, DEFAULT_THRESHOLD).await;
        assert_eq!(analysis.page_count, 3);
        assert_eq!(analysis.char_counts, vec![10, 100, 40]);
        assert_eq!(analysis.pages_needing_ocr, vec![1, 3]);
        assert!(analysis.errors.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_needs_no_ocr() {
        let analysis = analyze_pdf(
            &PdfToText::new(),
            Path::new("no/such/file.pdf"),
            DEFAULT_THRESHOLD,
        )
        .await;
        assert_eq!(analysis.page_count, 0);
        assert!(analysis.pages_needing_ocr.is_empty());
        assert_eq!(analysis.errors.len(), 1);
        assert!(analysis.errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_before_extraction() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR")?;
        let extractor = FakeExtractor::default().with_file("scan.pdf", &[0]);

        let analysis = analyze_pdf(&extractor, &path, DEFAULT_THRESHOLD).await;
        assert!(analysis.pages_needing_ocr.is_empty());
        assert!(analysis.errors[0].contains("is not a PDF (detected image/png)"));
        assert!(extractor.calls.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn junk_before_pdf_header_is_still_analyzed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bom.pdf");
        std::fs::write(&path, b"\r\n\xef\xbb\xbf%PDF-1.4\n")?;
        let extractor = FakeExtractor::default().with_file("bom.pdf", &[0, 100]);

        let analysis = analyze_pdf(&extractor, &path, DEFAULT_THRESHOLD).await;
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        assert_eq!(analysis.pages_needing_ocr, vec![1]);
        assert_eq!(extractor.calls.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn extraction_failure_needs_no_ocr() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, PDF_MAGIC)?;

        let analysis =
            analyze_pdf(&FakeExtractor::default(), &path, DEFAULT_THRESHOLD).await;
        assert!(analysis.pages_needing_ocr.is_empty());
        assert!(analysis.errors[0].contains("cannot parse broken.pdf"));
        Ok(())
    }
}
