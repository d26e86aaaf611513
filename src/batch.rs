//! The batch driver: find PDFs, decide what needs OCR, and dispatch it.

use std::sync::Arc;

use futures::{FutureExt as _, StreamExt as _, stream};

use crate::{
    async_utils::{BoxedFuture, io::JsonlWriter},
    ocr::{OcrJob, OcrMode, OcrTool},
    pdf::{
        classify::{PageAnalysis, analyze_pdf},
        text::TextExtractor,
    },
    prelude::*,
    report::{BatchSummary, FileReport, FileStatus},
    ui::{ProgressConfig, Ui},
};

/// How to treat each file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchMode {
    /// Classify pages and report, but never run OCR.
    Analyze,
    /// Classify pages, then OCR only the flagged ones. Output keeps the
    /// input's file name.
    Selective,
    /// Skip classification and force OCR on every page. Output is named
    /// `<stem><suffix>.pdf`.
    WholeFile { suffix: String },
}

/// Everything needed to process a batch of files.
pub struct Batch {
    pub extractor: Arc<dyn TextExtractor>,
    pub ocr: Arc<dyn OcrTool>,
    pub mode: BatchMode,
    pub output_dir: PathBuf,
    pub threshold: usize,
}

impl Batch {
    /// Process `files` with up to `jobs` files in flight, writing one report
    /// per file in input order.
    ///
    /// Per-file failures are reported, not returned. Only failing to write
    /// the report is fatal.
    #[instrument(level = "debug", skip_all, fields(files = files.len(), jobs = jobs))]
    pub async fn run(
        self: Arc<Self>,
        ui: &Ui,
        files: Vec<PathBuf>,
        jobs: usize,
        writer: &mut JsonlWriter,
    ) -> Result<BatchSummary> {
        let pb = ui.new_progress_bar(
            &ProgressConfig {
                emoji: "📄",
                msg: self.progress_msg(),
                done_msg: "Processed PDFs",
            },
            files.len() as u64,
        );

        let batch = self.clone();
        let pending = stream::iter(files).map(move |path| -> BoxedFuture<FileReport> {
            let batch = batch.clone();
            async move { batch.process_file(&path).await }.boxed()
        });
        let mut reports = pb.wrap_stream(pending.buffered(jobs.max(1))).boxed();

        let mut summary = BatchSummary::default();
        while let Some(report) = reports.next().await {
            debug!(path = %report.path.display(), status = %report.status, "finished file");
            summary.record(&report);
            writer.write_record(&report).await?;
        }
        summary.log();
        Ok(summary)
    }

    fn progress_msg(&self) -> &'static str {
        match self.mode {
            BatchMode::Analyze => "Analyzing PDFs",
            BatchMode::Selective | BatchMode::WholeFile { .. } => "OCRing PDFs",
        }
    }

    /// Process a single file. This never fails; problems are recorded in the
    /// report.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> FileReport {
        if matches!(self.mode, BatchMode::WholeFile { .. }) {
            return self.ocr_file(path, None, OcrMode::WholeFile).await;
        }

        let mut analysis = analyze_pdf(self.extractor.as_ref(), path, self.threshold).await;
        let errors = std::mem::take(&mut analysis.errors);
        let status = if !errors.is_empty() {
            FileStatus::Failed
        } else if analysis.pages_needing_ocr.is_empty() {
            FileStatus::Searchable
        } else if self.mode == BatchMode::Analyze {
            FileStatus::NeedsOcr
        } else {
            let pages = analysis.pages_needing_ocr.clone();
            return self.ocr_file(path, Some(analysis), OcrMode::Pages(pages)).await;
        };
        if status == FileStatus::Searchable {
            debug!(path = %path.display(), "no pages to OCR; skipping OCR step");
        }
        FileReport {
            path: path.to_owned(),
            status,
            analysis: Some(analysis),
            output_path: None,
            errors,
        }
    }

    /// Run OCR on a file and build its report.
    async fn ocr_file(
        &self,
        path: &Path,
        analysis: Option<PageAnalysis>,
        mode: OcrMode,
    ) -> FileReport {
        let result = match self.output_path(path) {
            Ok(output) => {
                let job = OcrJob {
                    input: path.to_owned(),
                    output,
                    mode,
                };
                self.ocr.run(&job).await.map(|()| job.output)
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(output) => FileReport {
                path: path.to_owned(),
                status: FileStatus::Ocred,
                analysis,
                output_path: Some(output),
                errors: vec![],
            },
            Err(err) => {
                error!(path = %path.display(), "OCR failed: {:#}", err);
                FileReport {
                    path: path.to_owned(),
                    status: FileStatus::Failed,
                    analysis,
                    output_path: None,
                    errors: vec![format!("{:#}", err)],
                }
            }
        }
    }

    /// Where should the OCRed version of `input` go?
    fn output_path(&self, input: &Path) -> Result<PathBuf> {
        match &self.mode {
            BatchMode::WholeFile { suffix } => {
                let stem = input
                    .file_stem()
                    .ok_or_else(|| anyhow!("no file name in {:?}", input.display()))?;
                let mut name = stem.to_owned();
                name.push(format!("{suffix}.pdf"));
                Ok(self.output_dir.join(name))
            }
            BatchMode::Analyze | BatchMode::Selective => {
                let name = input
                    .file_name()
                    .ok_or_else(|| anyhow!("no file name in {:?}", input.display()))?;
                Ok(self.output_dir.join(name))
            }
        }
    }
}

/// List the PDFs directly inside `source_dir`, sorted by name.
///
/// Matching on the `.pdf` extension is case-insensitive. If `skip_suffix`
/// is given, files named `<stem><skip_suffix>.pdf` are left out, since they
/// are outputs from an earlier run.
#[instrument(level = "debug", skip_all, fields(source_dir = %source_dir.display()))]
pub async fn list_pdf_files(
    source_dir: &Path,
    skip_suffix: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let processed_ending = skip_suffix
        .filter(|suffix| !suffix.is_empty())
        .map(|suffix| format!("{}.pdf", suffix.to_lowercase()));

    let mut entries = tokio::fs::read_dir(source_dir)
        .await
        .with_context(|| format!("cannot read directory {:?}", source_dir.display()))?;
    let mut paths = vec![];
    while let Some(entry) = entries.next_entry().await.with_context(|| {
        format!("cannot read entry in directory {:?}", source_dir.display())
    })? {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !name.ends_with(".pdf") {
            continue;
        }
        if let Some(ending) = &processed_ending
            && name.ends_with(ending.as_str())
        {
            debug!(file = %name, "skipping already-processed file");
            continue;
        }
        let path = entry.path();
        // Follow symlinks, but skip directories named `*.pdf`.
        if !tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
        {
            continue;
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}

/// Create `dir` if it doesn't exist yet.
pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("cannot create output directory {:?}", dir.display()))?;
        info!(dir = %dir.display(), "created output directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        ocr::tests::FakeOcr,
        pdf::classify::{
            DEFAULT_THRESHOLD,
            tests::{FakeExtractor, PDF_MAGIC},
        },
    };

    struct Fixture {
        dir: tempfile::TempDir,
        extractor: Arc<FakeExtractor>,
        ocr: Arc<FakeOcr>,
    }

    impl Fixture {
        /// Create PDFs in `<tmp>/archive` with the given per-page character
        /// counts.
        fn new(files: &[(&str, Vec<usize>)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir(dir.path().join("archive")).unwrap();
            let mut extractor = FakeExtractor::default();
            for (name, counts) in files {
                fs::write(dir.path().join("archive").join(name), PDF_MAGIC).unwrap();
                extractor = extractor.with_file(name, counts);
            }
            Self {
                dir,
                extractor: Arc::new(extractor),
                ocr: Arc::new(FakeOcr::default()),
            }
        }

        fn source(&self) -> PathBuf {
            self.dir.path().join("archive")
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("ocr")
        }

        fn batch(&self, mode: BatchMode) -> Arc<Batch> {
            Arc::new(Batch {
                extractor: self.extractor.clone(),
                ocr: self.ocr.clone(),
                mode,
                output_dir: self.output(),
                threshold: DEFAULT_THRESHOLD,
            })
        }

        fn jobs(&self) -> Vec<OcrJob> {
            self.ocr.jobs.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn selective_mode_ocrs_only_short_pages() {
        let fx = Fixture::new(&[("mixed.pdf", vec![10, 100, 40])]);
        let input = fx.source().join("mixed.pdf");

        let report = fx.batch(BatchMode::Selective).process_file(&input).await;
        assert_eq!(report.status, FileStatus::Ocred);
        assert_eq!(report.output_path, Some(fx.output().join("mixed.pdf")));
        assert_eq!(
            fx.jobs(),
            vec![OcrJob {
                input,
                output: fx.output().join("mixed.pdf"),
                mode: OcrMode::Pages(vec![1, 3]),
            }]
        );
    }

    #[tokio::test]
    async fn searchable_file_is_not_ocred() {
        let fx = Fixture::new(&[("digital.pdf", vec![53, 400])]);
        let report = fx
            .batch(BatchMode::Selective)
            .process_file(&fx.source().join("digital.pdf"))
            .await;
        assert_eq!(report.status, FileStatus::Searchable);
        assert!(report.output_path.is_none());
        assert!(fx.jobs().is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_is_not_ocred() {
        let fx = Fixture::new(&[]);
        let report = fx
            .batch(BatchMode::Selective)
            .process_file(&fx.source().join("missing.pdf"))
            .await;
        assert_eq!(report.status, FileStatus::Failed);
        assert!(report.analysis.unwrap().pages_needing_ocr.is_empty());
        assert!(report.errors[0].contains("not found"));
        assert!(fx.jobs().is_empty());
    }

    #[tokio::test]
    async fn analyze_mode_never_runs_ocr() {
        let fx = Fixture::new(&[("scan.pdf", vec![0, 0])]);
        let report = fx
            .batch(BatchMode::Analyze)
            .process_file(&fx.source().join("scan.pdf"))
            .await;
        assert_eq!(report.status, FileStatus::NeedsOcr);
        assert_eq!(report.analysis.unwrap().pages_needing_ocr, vec![1, 2]);
        assert!(fx.jobs().is_empty());
    }

    #[tokio::test]
    async fn whole_file_mode_skips_analysis_and_adds_suffix() {
        let fx = Fixture::new(&[("Tome 1.pdf", vec![500])]);
        let input = fx.source().join("Tome 1.pdf");
        let batch = fx.batch(BatchMode::WholeFile {
            suffix: "_ocr".to_owned(),
        });

        let report = batch.process_file(&input).await;
        assert_eq!(report.status, FileStatus::Ocred);
        assert!(report.analysis.is_none());
        assert!(fx.extractor.calls.lock().unwrap().is_empty());
        assert_eq!(
            fx.jobs(),
            vec![OcrJob {
                input,
                output: fx.output().join("Tome 1_ocr.pdf"),
                mode: OcrMode::WholeFile,
            }]
        );
    }

    #[tokio::test]
    async fn ocr_failures_do_not_stop_the_batch() -> Result<()> {
        let fx = Fixture::new(&[
            ("a_fail.pdf", vec![0]),
            ("b.pdf", vec![0, 80]),
            ("c.pdf", vec![90]),
        ]);
        let report_path = fx.dir.path().join("report.jsonl");
        let mut writer = JsonlWriter::create(Some(&report_path)).await?;
        let files = list_pdf_files(&fx.source(), None).await?;

        let summary = fx
            .batch(BatchMode::Selective)
            .run(&Ui::init_for_tests(), files, 2, &mut writer)
            .await?;
        writer.finish().await?;

        assert_eq!(
            summary,
            BatchSummary {
                searchable: 1,
                needs_ocr: 0,
                ocred: 1,
                failed: 1,
            }
        );
        assert_eq!(fx.jobs().len(), 2);

        let lines = fs::read_to_string(&report_path)?;
        let statuses = lines
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["status"].as_str().unwrap().to_owned()
            })
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec!["failed", "ocred", "searchable"]);
        Ok(())
    }

    #[tokio::test]
    async fn lists_pdfs_and_skips_processed_outputs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.PDF", "a.pdf", "a_ocr.pdf", "c_OCR.PDF", "notes.txt"] {
            fs::write(dir.path().join(name), PDF_MAGIC)?;
        }
        fs::create_dir(dir.path().join("folder.pdf"))?;

        let files = list_pdf_files(dir.path(), Some("_ocr")).await?;
        let names = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);

        let all = list_pdf_files(dir.path(), None).await?;
        assert_eq!(all.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_directory_is_an_error() {
        let err = list_pdf_files(Path::new("no/such/archive"), None)
            .await
            .expect_err("directory should be missing");
        assert!(err.to_string().contains("cannot read directory"));
    }

    #[tokio::test]
    async fn creates_output_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("nested").join("ocr");
        ensure_output_dir(&out).await?;
        assert!(out.is_dir());
        // Second call is a no-op.
        ensure_output_dir(&out).await?;
        Ok(())
    }
}
