//! OCR engine wrapping the `ocrmypdf` CLI tool.

use std::ffi::OsString;

use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, is_command_not_found},
    prelude::*,
};

use super::{OcrJob, OcrMode, OcrTool, page_list_arg};

/// Default program name.
pub const DEFAULT_PROGRAM: &str = "ocrmypdf";

/// Default Tesseract languages: Greek, English and Turkish.
pub const DEFAULT_LANGUAGES: &str = "ell+eng+tur";

/// [`OcrTool`] which runs `ocrmypdf` as a child process.
#[derive(Clone, Debug)]
pub struct OcrMyPdf {
    /// Program to run. Usually [`DEFAULT_PROGRAM`].
    program: OsString,
    /// Tesseract language codes joined with `+`, passed via `-l`.
    languages: String,
}

impl OcrMyPdf {
    /// Create a new `ocrmypdf` runner.
    pub fn new(program: impl Into<OsString>, languages: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            languages: languages.into(),
        }
    }

    /// Build the argument list for a job, writing to `output`.
    fn args(&self, job: &OcrJob, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-l".into(), self.languages.clone().into()];
        match &job.mode {
            OcrMode::Pages(pages) => {
                args.push("--redo-ocr".into());
                args.push("--pages".into());
                args.push(page_list_arg(pages).into());
            }
            OcrMode::WholeFile => args.push("--force-ocr".into()),
        }
        args.push(job.input.clone().into());
        args.push(output.into());
        args
    }
}

#[async_trait]
impl OcrTool for OcrMyPdf {
    #[instrument(level = "debug", skip_all, fields(input = %job.input.display(), mode = %job.mode))]
    async fn run(&self, job: &OcrJob) -> Result<()> {
        let program = self.program.to_string_lossy();

        // Write into a temporary file next to the final output, so that a
        // failed run never leaves a partial PDF behind.
        let output_dir = job
            .output
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp_path = tempfile::Builder::new()
            .prefix(".ocr-sweep-")
            .suffix(".pdf")
            .tempfile_in(output_dir)
            .with_context(|| {
                format!("cannot create temporary file in {:?}", output_dir.display())
            })?
            .into_temp_path();

        info!(input = %job.input.display(), mode = %job.mode, "running {}", program);
        let output = match Command::new(&self.program)
            .args(self.args(job, &tmp_path))
            .output()
            .await
        {
            Ok(output) => output,
            Err(err) if is_command_not_found(&err) => {
                return Err(anyhow!(
                    "{} command not found; please ensure it is installed and in your PATH",
                    program
                ));
            }
            Err(err) => {
                return Err(anyhow!(err).context(format!("cannot run {}", program)));
            }
        };
        check_for_command_failure(&program, &output, None)?;

        tmp_path.persist(&job.output).with_context(|| {
            format!("cannot move OCR output to {:?}", job.output.display())
        })?;
        info!(output = %job.output.display(), "OCR completed");
        Ok(())
    }
}
